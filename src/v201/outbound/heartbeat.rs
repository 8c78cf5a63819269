//! Heartbeat (2.0.1).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_ocpp::v2_0_1::messages::heartbeat::{HeartbeatRequest, HeartbeatResponse};
use tracing::debug;

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn send(station: &Arc<Station>) -> Result<DateTime<Utc>, OcppError> {
    let opts = CallOptions {
        skip_buffering_on_error: true,
        ..Default::default()
    };
    let response: HeartbeatResponse =
        super::call(station, "Heartbeat", &HeartbeatRequest {}, opts).await?;
    debug!(
        station_id = station.id(),
        current_time = %response.current_time,
        "Heartbeat acknowledged"
    );
    Ok(response.current_time)
}

//! StatusNotification (2.0.1) tied to the connector FSM.
//!
//! The simulator maps each EVSE to one connector, so `evse_id` equals the
//! connector record id and the connector number inside the EVSE is 1.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};

use crate::domain::connector::ConnectorStatusValue;
use crate::domain::transitions;
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn update_and_notify(
    station: &Arc<Station>,
    evse_id: u32,
    status: ConnectorStatusEnumType,
) -> Result<bool, OcppError> {
    let Some(ConnectorStatusValue::V201(current)) = station.connector_status(evse_id) else {
        return Ok(false);
    };
    if !transitions::v201_connector_allowed(&current, &status) {
        tracing::warn!(
            station_id = station.id(),
            evse_id,
            from = ?current,
            to = ?status,
            "Refusing status transition outside the allow-list"
        );
        return Ok(false);
    }

    let request = StatusNotificationRequest {
        timestamp: Utc::now(),
        connector_status: status.clone(),
        evse_id: evse_id as i32,
        connector_id: 1,
    };
    let _: StatusNotificationResponse =
        super::call(station, "StatusNotification", &request, CallOptions::default()).await?;

    station.with_connector(evse_id, |c| {
        c.status = ConnectorStatusValue::V201(status);
    });
    Ok(true)
}

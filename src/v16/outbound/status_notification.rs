//! StatusNotification emission tied to the connector FSM.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus};

use crate::domain::connector::ConnectorStatusValue;
use crate::domain::transitions;
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Emit a StatusNotification and move the connector to `status`.
///
/// The pair (current, status) must be in the transition allow-list for the
/// component (connector vs station); a refused pair changes nothing and
/// returns `false`. The notification goes out before the state flips, so
/// observers and the store agree on ordering.
pub async fn update_and_notify(
    station: &Arc<Station>,
    connector_id: u32,
    status: ChargePointStatus,
) -> Result<bool, OcppError> {
    let Some(ConnectorStatusValue::V16(current)) = station.connector_status(connector_id) else {
        return Ok(false);
    };
    let allowed = if connector_id == 0 {
        transitions::v16_station_allowed(&current, &status)
    } else {
        transitions::v16_connector_allowed(&current, &status)
    };
    if !allowed {
        tracing::warn!(
            station_id = station.id(),
            connector_id,
            from = ?current,
            to = ?status,
            "Refusing status transition outside the allow-list"
        );
        return Ok(false);
    }

    send(station, connector_id, status.clone(), false).await?;
    station.with_connector(connector_id, |c| {
        c.status = ConnectorStatusValue::V16(status);
    });
    Ok(true)
}

/// Raw StatusNotification send, without touching the stored status. Used by
/// TriggerMessage re-emissions.
pub async fn send(
    station: &Arc<Station>,
    connector_id: u32,
    status: ChargePointStatus,
    triggered: bool,
) -> Result<(), OcppError> {
    let request = StatusNotificationRequest {
        connector_id,
        error_code: ChargePointErrorCode::NoError,
        info: None,
        status,
        timestamp: Some(Utc::now()),
        vendor_id: None,
        vendor_error_code: None,
    };
    let opts = CallOptions {
        triggered,
        ..Default::default()
    };
    let _: StatusNotificationResponse =
        super::call(station, "StatusNotification", &request, opts).await?;
    Ok(())
}

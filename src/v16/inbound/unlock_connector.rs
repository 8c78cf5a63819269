//! UnlockConnector.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};
use rust_ocpp::v1_6::types::{ChargePointStatus, UnlockStatus};
use tracing::info;

use crate::domain::connector::StopReason;
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::status_notification;

pub async fn handle(
    station: &Arc<Station>,
    req: UnlockConnectorRequest,
) -> Result<UnlockConnectorResponse, OcppError> {
    let connector_id = req.connector_id;
    if connector_id == 0 || !station.has_connector(connector_id) {
        return Ok(UnlockConnectorResponse {
            status: UnlockStatus::UnlockFailed,
        });
    }

    let active = station
        .read_connector(connector_id, |c| c.has_active_transaction())
        .unwrap_or(false);

    let status = if active {
        let stopped = station
            .stop_transaction_on_connector(connector_id, StopReason::UnlockCommand)
            .await;
        if stopped {
            UnlockStatus::Unlocked
        } else {
            UnlockStatus::UnlockFailed
        }
    } else {
        status_notification::update_and_notify(station, connector_id, ChargePointStatus::Available)
            .await?;
        UnlockStatus::Unlocked
    };

    info!(station_id = station.id(), connector_id, ?status, "UnlockConnector handled");
    Ok(UnlockConnectorResponse { status })
}

//! ChangeAvailability.
//!
//! Connector 0 fans out to every connector. Availability is stored right
//! away in all cases; when a transaction is still running the answer is
//! Scheduled and the status change waits for the transaction to end.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use rust_ocpp::v1_6::types::{AvailabilityStatus, AvailabilityType, ChargePointStatus};
use tracing::info;

use crate::domain::connector::Availability;
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::status_notification;

fn target(kind: &AvailabilityType) -> (Availability, ChargePointStatus) {
    match kind {
        AvailabilityType::Operative => (Availability::Operative, ChargePointStatus::Available),
        AvailabilityType::Inoperative => (Availability::Inoperative, ChargePointStatus::Unavailable),
    }
}

pub async fn handle(
    station: &Arc<Station>,
    req: ChangeAvailabilityRequest,
) -> Result<ChangeAvailabilityResponse, OcppError> {
    if !station.has_connector(req.connector_id) {
        return Ok(ChangeAvailabilityResponse {
            status: AvailabilityStatus::Rejected,
        });
    }
    let (availability, status) = target(&req.kind);

    let response_status = if req.connector_id == 0 {
        let any_transaction = station.active_transaction_count() > 0;
        station.with_connector(0, |c| c.availability = availability);
        for connector_id in station.connector_ids() {
            station.with_connector(connector_id, |c| c.availability = availability);
        }
        if any_transaction {
            AvailabilityStatus::Scheduled
        } else {
            status_notification::update_and_notify(station, 0, status.clone()).await?;
            for connector_id in station.connector_ids() {
                status_notification::update_and_notify(station, connector_id, status.clone())
                    .await?;
            }
            AvailabilityStatus::Accepted
        }
    } else {
        let has_transaction = station
            .read_connector(req.connector_id, |c| c.has_active_transaction())
            .unwrap_or(false);
        station.with_connector(req.connector_id, |c| c.availability = availability);
        if has_transaction {
            AvailabilityStatus::Scheduled
        } else {
            status_notification::update_and_notify(station, req.connector_id, status).await?;
            AvailabilityStatus::Accepted
        }
    };

    info!(
        station_id = station.id(),
        connector_id = req.connector_id,
        kind = ?req.kind,
        status = ?response_status,
        "ChangeAvailability handled"
    );
    Ok(ChangeAvailabilityResponse {
        status: response_status,
    })
}

//! CancelReservation.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::cancel_reservation::{
    CancelReservationRequest, CancelReservationResponse,
};
use rust_ocpp::v1_6::types::{CancelReservationStatus, ChargePointStatus};

use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::status_notification;

pub async fn handle(
    station: &Arc<Station>,
    req: CancelReservationRequest,
) -> Result<CancelReservationResponse, OcppError> {
    let holder = station.connector_ids().into_iter().find(|id| {
        station
            .read_connector(*id, |c| {
                c.reservation
                    .as_ref()
                    .map(|r| r.reservation_id == req.reservation_id)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    });

    let Some(connector_id) = holder else {
        return Ok(CancelReservationResponse {
            status: CancelReservationStatus::Rejected,
        });
    };

    station.with_connector(connector_id, |c| c.reservation = None);
    status_notification::update_and_notify(station, connector_id, ChargePointStatus::Available)
        .await?;

    Ok(CancelReservationResponse {
        status: CancelReservationStatus::Accepted,
    })
}

//! ReserveNow.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::reserve_now::{ReserveNowRequest, ReserveNowResponse};
use rust_ocpp::v1_6::types::{ChargePointStatus, ReservationStatus};
use tracing::info;

use crate::domain::connector::{ConnectorStatusValue, Reservation};
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::status_notification;

pub async fn handle(
    station: &Arc<Station>,
    req: ReserveNowRequest,
) -> Result<ReserveNowResponse, OcppError> {
    let connector_id = req.connector_id;
    if connector_id == 0 || !station.has_connector(connector_id) {
        return Ok(ReserveNowResponse {
            status: ReservationStatus::Rejected,
        });
    }

    let Some(ConnectorStatusValue::V16(current)) = station.connector_status(connector_id) else {
        return Ok(ReserveNowResponse {
            status: ReservationStatus::Rejected,
        });
    };
    let operative = station
        .read_connector(connector_id, |c| c.is_operative())
        .unwrap_or(false);

    let status = match current {
        _ if !operative => ReservationStatus::Unavailable,
        ChargePointStatus::Faulted => ReservationStatus::Faulted,
        ChargePointStatus::Charging
        | ChargePointStatus::Preparing
        | ChargePointStatus::SuspendedEV
        | ChargePointStatus::SuspendedEVSE
        | ChargePointStatus::Finishing => ReservationStatus::Occupied,
        ChargePointStatus::Unavailable => ReservationStatus::Unavailable,
        ChargePointStatus::Available | ChargePointStatus::Reserved => {
            station.with_connector(connector_id, |c| {
                c.reservation = Some(Reservation {
                    reservation_id: req.reservation_id,
                    id_tag: req.id_tag.clone(),
                    parent_id_tag: req.parent_id_tag.clone(),
                    expiry_date: req.expiry_date,
                });
            });
            status_notification::update_and_notify(
                station,
                connector_id,
                ChargePointStatus::Reserved,
            )
            .await?;
            ReservationStatus::Accepted
        }
    };

    info!(
        station_id = station.id(),
        connector_id,
        reservation_id = req.reservation_id,
        ?status,
        "ReserveNow handled"
    );
    Ok(ReserveNowResponse { status })
}

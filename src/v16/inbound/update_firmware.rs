//! UpdateFirmware.
//!
//! The response is always empty per OCPP 1.6; the simulation only starts
//! when no earlier update is still in flight.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::update_firmware::{UpdateFirmwareRequest, UpdateFirmwareResponse};
use rust_ocpp::v1_6::types::FirmwareStatus;
use tracing::warn;

use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::firmware;

pub async fn handle(
    station: &Arc<Station>,
    req: UpdateFirmwareRequest,
) -> Result<UpdateFirmwareResponse, OcppError> {
    let idle = matches!(
        station.firmware_status(),
        None | Some(FirmwareStatus::Installed)
    );
    if !idle {
        warn!(
            station_id = station.id(),
            status = ?station.firmware_status(),
            "Ignoring UpdateFirmware, an update is already in flight"
        );
        return Ok(UpdateFirmwareResponse {});
    }

    firmware::schedule_simulation(station, req.retrieve_date);
    Ok(UpdateFirmwareResponse {})
}

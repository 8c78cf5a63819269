//! BootNotification and its response handling.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::types::RegistrationStatus;
use tracing::{info, warn};

use crate::domain::registration::RegistrationState;
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Announce the station. On Accepted the CSMS-provided interval overwrites
/// `HeartbeatInterval` (and its legacy mirror) and the heartbeat starts.
pub async fn send(station: &Arc<Station>) -> Result<RegistrationStatus, OcppError> {
    let config = station.config();
    // Only defined fields go on the wire; rust_ocpp skips the Nones.
    let request = BootNotificationRequest {
        charge_point_vendor: config.vendor.clone(),
        charge_point_model: config.model.clone(),
        charge_point_serial_number: config.serial_number.clone(),
        charge_box_serial_number: None,
        firmware_version: config.firmware_version.clone(),
        iccid: config.iccid.clone(),
        imsi: config.imsi.clone(),
        meter_serial_number: None,
        meter_type: None,
    };

    let opts = CallOptions {
        // A boot is resent on reconnect anyway, never replay a stale one.
        skip_buffering_on_error: true,
        ..Default::default()
    };
    let response: BootNotificationResponse =
        super::call(station, "BootNotification", &request, opts).await?;

    match response.status {
        RegistrationStatus::Accepted => {
            info!(
                station_id = station.id(),
                interval = response.interval,
                "Registration accepted"
            );
            station.set_registration(RegistrationState::Accepted);
            station.apply_heartbeat_interval(response.interval as i64);
        }
        RegistrationStatus::Pending => {
            info!(
                station_id = station.id(),
                "Registration pending, waiting for CSMS instructions"
            );
            station.set_registration(RegistrationState::Pending);
        }
        RegistrationStatus::Rejected => {
            warn!(
                station_id = station.id(),
                retry_interval = response.interval,
                "Registration rejected"
            );
            station.set_registration(RegistrationState::Rejected);
        }
    }
    Ok(response.status)
}

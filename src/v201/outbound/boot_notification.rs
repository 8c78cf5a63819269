//! BootNotification (2.0.1) and its response handling.

use std::sync::Arc;

use rust_ocpp::v2_0_1::datatypes::charging_station_type::ChargingStationType;
use rust_ocpp::v2_0_1::enumerations::boot_reason_enum_type::BootReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::registration_status_enum_type::RegistrationStatusEnumType;
use rust_ocpp::v2_0_1::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use tracing::{info, warn};

use crate::domain::registration::RegistrationState;
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn send(station: &Arc<Station>) -> Result<RegistrationStatusEnumType, OcppError> {
    let config = station.config();
    let request = BootNotificationRequest {
        charging_station: ChargingStationType {
            model: config.model.clone(),
            vendor_name: config.vendor.clone(),
            serial_number: config.serial_number.clone(),
            firmware_version: config.firmware_version.clone(),
            modem: None,
        },
        reason: BootReasonEnumType::PowerUp,
    };

    let opts = CallOptions {
        skip_buffering_on_error: true,
        ..Default::default()
    };
    let response: BootNotificationResponse =
        super::call(station, "BootNotification", &request, opts).await?;

    match response.status {
        RegistrationStatusEnumType::Accepted => {
            info!(
                station_id = station.id(),
                interval = response.interval,
                "Registration accepted"
            );
            station.set_registration(RegistrationState::Accepted);
            station.apply_heartbeat_interval(response.interval as i64);
        }
        RegistrationStatusEnumType::Pending => {
            info!(
                station_id = station.id(),
                "Registration pending, only CSMS-initiated traffic allowed"
            );
            station.set_registration(RegistrationState::Pending);
        }
        RegistrationStatusEnumType::Rejected => {
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

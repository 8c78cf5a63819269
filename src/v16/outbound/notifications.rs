//! Firmware and diagnostics status notifications.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::diagnostics_status_notification::{
    DiagnosticsStatusNotificationRequest, DiagnosticsStatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::firmware_status_notification::{
    FirmwareStatusNotificationRequest, FirmwareStatusNotificationResponse,
};
use rust_ocpp::v1_6::types::{DiagnosticsStatus, FirmwareStatus};

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Push a firmware status and remember it on the station.
pub async fn send_firmware_status(
    station: &Arc<Station>,
    status: FirmwareStatus,
    triggered: bool,
) -> Result<(), OcppError> {
    station.set_firmware_status(Some(status.clone()));
    let request = FirmwareStatusNotificationRequest { status };
    let opts = CallOptions {
        triggered,
        ..Default::default()
    };
    let _: FirmwareStatusNotificationResponse =
        super::call(station, "FirmwareStatusNotification", &request, opts).await?;
    Ok(())
}

/// Push a diagnostics status and remember it on the station.
pub async fn send_diagnostics_status(
    station: &Arc<Station>,
    status: DiagnosticsStatus,
    triggered: bool,
) -> Result<(), OcppError> {
    station.set_diagnostics_status(Some(status.clone()));
    let request = DiagnosticsStatusNotificationRequest { status };
    let opts = CallOptions {
        triggered,
        ..Default::default()
    };
    let _: DiagnosticsStatusNotificationResponse =
        super::call(station, "DiagnosticsStatusNotification", &request, opts).await?;
    Ok(())
}

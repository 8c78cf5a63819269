//! TriggerMessage.
//!
//! Accepted triggers are re-emitted after a fixed small delay so the
//! CALLRESULT reaches the CSMS first. A StatusNotification trigger with no
//! connector id fans out to every connector.

use std::sync::Arc;
use std::time::Duration;

use rust_ocpp::v1_6::messages::trigger_message::{TriggerMessageRequest, TriggerMessageResponse};
use rust_ocpp::v1_6::types::{DiagnosticsStatus, FirmwareStatus, MessageTrigger, TriggerMessageStatus};
use tracing::debug;

use crate::domain::connector::ConnectorStatusValue;
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::{
    boot_notification, heartbeat, meter_values, notifications, status_notification,
};

/// Delay between the CALLRESULT and the triggered emission.
pub const TRIGGER_MESSAGE_DELAY: Duration = Duration::from_millis(500);

pub async fn handle(
    station: &Arc<Station>,
    req: TriggerMessageRequest,
) -> Result<TriggerMessageResponse, OcppError> {
    if let Some(connector_id) = req.connector_id {
        if connector_id == 0 || !station.has_connector(connector_id) {
            return Ok(TriggerMessageResponse {
                status: TriggerMessageStatus::Rejected,
            });
        }
    }

    let worker = station.clone();
    let trigger = req.requested_message.clone();
    let connector_id = req.connector_id;
    let job = tokio::spawn(async move {
        tokio::time::sleep(TRIGGER_MESSAGE_DELAY).await;
        emit(&worker, trigger, connector_id).await;
    });
    station.tasks().push_background(job);

    Ok(TriggerMessageResponse {
        status: TriggerMessageStatus::Accepted,
    })
}

async fn emit(station: &Arc<Station>, trigger: MessageTrigger, connector_id: Option<u32>) {
    let result: Result<(), OcppError> = async {
        match trigger {
            MessageTrigger::BootNotification => {
                boot_notification::send(station).await?;
            }
            MessageTrigger::Heartbeat => {
                heartbeat::send(station).await?;
            }
            MessageTrigger::MeterValues => {
                for id in targets(station, connector_id) {
                    meter_values::send_triggered(station, id).await?;
                }
            }
            MessageTrigger::StatusNotification => {
                for id in targets(station, connector_id) {
                    if let Some(ConnectorStatusValue::V16(status)) = station.connector_status(id) {
                        status_notification::send(station, id, status, true).await?;
                    }
                }
            }
            MessageTrigger::DiagnosticsStatusNotification => {
                let status = station.diagnostics_status().unwrap_or(DiagnosticsStatus::Idle);
                notifications::send_diagnostics_status(station, status, true).await?;
            }
            MessageTrigger::FirmwareStatusNotification => {
                let status = station.firmware_status().unwrap_or(FirmwareStatus::Idle);
                notifications::send_firmware_status(station, status, true).await?;
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        debug!(station_id = station.id(), error = %e, "Triggered emission failed");
    }
}

fn targets(station: &Arc<Station>, connector_id: Option<u32>) -> Vec<u32> {
    match connector_id {
        Some(id) => vec![id],
        None => station.connector_ids(),
    }
}

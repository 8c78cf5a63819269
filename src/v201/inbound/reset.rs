//! Reset (2.0.1): Immediate | OnIdle, optionally per EVSE.

use std::sync::Arc;
use std::time::Duration;

use rust_ocpp::v2_0_1::datatypes::status_info_type::StatusInfoType;
use rust_ocpp::v2_0_1::enumerations::reset_enum_type::ResetEnumType;
use rust_ocpp::v2_0_1::enumerations::reset_status_enum_type::ResetStatusEnumType;
use rust_ocpp::v2_0_1::messages::reset::{ResetRequest, ResetResponse};
use tracing::info;

use crate::domain::connector::StopReason;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Poll cadence while waiting for the station to go idle.
const IDLE_POLL: Duration = Duration::from_secs(5);

pub async fn handle(station: &Arc<Station>, req: ResetRequest) -> Result<ResetResponse, OcppError> {
    if let Some(evse_id) = req.evse_id {
        if evse_id <= 0 || !station.has_evse(evse_id as u32) {
            return Ok(ResetResponse {
                status: ResetStatusEnumType::Rejected,
                status_info: Some(StatusInfoType {
                    reason_code: "UnknownEvse".to_string(),
                    additional_info: None,
                }),
            });
        }
    }

    info!(
        station_id = station.id(),
        kind = ?req.request_type,
        evse_id = ?req.evse_id,
        "Reset requested"
    );

    let targets: Vec<u32> = match req.evse_id {
        Some(evse_id) => vec![evse_id as u32],
        None => station.connector_ids(),
    };
    let busy = targets
        .iter()
        .any(|id| station.read_connector(*id, |c| c.has_active_transaction()).unwrap_or(false));

    let status = match req.request_type {
        ResetEnumType::Immediate => ResetStatusEnumType::Accepted,
        ResetEnumType::OnIdle if busy => ResetStatusEnumType::Scheduled,
        ResetEnumType::OnIdle => ResetStatusEnumType::Accepted,
    };

    let worker = station.clone();
    let kind = req.request_type;
    let evse_scope = req.evse_id;
    let job = tokio::spawn(async move {
        match kind {
            ResetEnumType::Immediate => {
                for connector_id in &targets {
                    let active = worker
                        .read_connector(*connector_id, |c| c.has_active_transaction())
                        .unwrap_or(false);
                    if active {
                        worker
                            .stop_transaction_on_connector(*connector_id, StopReason::ImmediateReset)
                            .await;
                    }
                }
            }
            ResetEnumType::OnIdle => {
                // Poll until every targeted transaction ended on its own.
                loop {
                    let busy = targets.iter().any(|id| {
                        worker
                            .read_connector(*id, |c| c.has_active_transaction())
                            .unwrap_or(false)
                    });
                    if !busy {
                        break;
                    }
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }
        if evse_scope.is_none() {
            worker.reboot("ResetCommand").await;
        }
    });
    station.tasks().push_background(job);

    Ok(ResetResponse {
        status,
        status_info: None,
    })
}

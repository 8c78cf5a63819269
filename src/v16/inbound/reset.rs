//! Reset (Soft | Hard).
//!
//! The command is acknowledged immediately; teardown and reboot run as a
//! fire-and-forget job. Hard resets normally end running transactions
//! first; under strict compliance the legacy 1.6 behaviour (restart
//! without teardown) is preserved.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::reset::{ResetRequest, ResetResponse};
use rust_ocpp::v1_6::types::{ResetRequestStatus, ResetResponseStatus};
use tracing::info;

use crate::domain::connector::StopReason;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(station: &Arc<Station>, req: ResetRequest) -> Result<ResetResponse, OcppError> {
    info!(station_id = station.id(), kind = ?req.kind, "Reset requested");

    let worker = station.clone();
    let kind = req.kind;
    let job = tokio::spawn(async move {
        let (reason, stop_transactions) = match kind {
            ResetRequestStatus::Hard if worker.strict_compliance() => ("HardReset", false),
            ResetRequestStatus::Hard => ("HardReset", true),
            ResetRequestStatus::Soft => ("SoftReset", true),
        };
        if stop_transactions {
            let stop_reason = match kind {
                ResetRequestStatus::Hard => StopReason::HardReset,
                ResetRequestStatus::Soft => StopReason::SoftReset,
            };
            for connector_id in worker.connector_ids() {
                let active = worker
                    .read_connector(connector_id, |c| c.has_active_transaction())
                    .unwrap_or(false);
                if active {
                    worker
                        .stop_transaction_on_connector(connector_id, stop_reason)
                        .await;
                }
            }
        }
        worker.reboot(reason).await;
    });
    station.tasks().push_background(job);

    Ok(ResetResponse {
        status: ResetResponseStatus::Accepted,
    })
}

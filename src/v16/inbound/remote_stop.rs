//! RemoteStopTransaction.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use rust_ocpp::v1_6::types::{ChargePointStatus, RemoteStartStopStatus};
use tracing::{info, warn};

use crate::domain::connector::{StopReason, TransactionId};
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::status_notification;

pub async fn handle(
    station: &Arc<Station>,
    req: RemoteStopTransactionRequest,
) -> Result<RemoteStopTransactionResponse, OcppError> {
    let transaction_id = TransactionId::Integer(req.transaction_id);
    let Some(connector_id) = station.connector_with_transaction(&transaction_id) else {
        warn!(
            station_id = station.id(),
            transaction_id = req.transaction_id,
            "RemoteStopTransaction for unknown transaction"
        );
        return Ok(RemoteStopTransactionResponse {
            status: RemoteStartStopStatus::Rejected,
        });
    };

    status_notification::update_and_notify(station, connector_id, ChargePointStatus::Finishing)
        .await?;
    let stopped = station
        .stop_transaction_on_connector(connector_id, StopReason::Remote)
        .await;

    info!(
        station_id = station.id(),
        connector_id,
        transaction_id = req.transaction_id,
        stopped,
        "Remote stop handled"
    );
    Ok(RemoteStopTransactionResponse {
        status: if stopped {
            RemoteStartStopStatus::Accepted
        } else {
            RemoteStartStopStatus::Rejected
        },
    })
}

//! RequestStopTransaction.

use std::sync::Arc;

use rust_ocpp::v2_0_1::enumerations::request_start_stop_status_enum_type::RequestStartStopStatusEnumType;
use rust_ocpp::v2_0_1::messages::request_stop_transaction::{
    RequestStopTransactionRequest, RequestStopTransactionResponse,
};
use tracing::{info, warn};

use crate::domain::connector::{StopReason, TransactionId};
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v201::transaction_event;
use crate::v201::trigger_reason::{RemoteCommand, TriggerContext};

pub async fn handle(
    station: &Arc<Station>,
    req: RequestStopTransactionRequest,
) -> Result<RequestStopTransactionResponse, OcppError> {
    let transaction_id = TransactionId::Uuid(req.transaction_id.clone());
    let Some(evse_id) = station.connector_with_transaction(&transaction_id) else {
        warn!(
            station_id = station.id(),
            transaction_id = req.transaction_id.as_str(),
            "RequestStopTransaction for unknown transaction"
        );
        return Ok(RequestStopTransactionResponse {
            status: RequestStartStopStatusEnumType::Rejected,
            status_info: None,
        });
    };

    let ctx = TriggerContext::remote(RemoteCommand::RequestStop);
    let stopped = transaction_event::send_ended(station, evse_id, StopReason::Remote, ctx)
        .await
        .is_ok();

    info!(
        station_id = station.id(),
        evse_id,
        transaction_id = req.transaction_id.as_str(),
        stopped,
        "Remote stop handled"
    );
    Ok(RequestStopTransactionResponse {
        status: if stopped {
            RequestStartStopStatusEnumType::Accepted
        } else {
            RequestStartStopStatusEnumType::Rejected
        },
        status_info: None,
    })
}

//! CSMS-initiated OCPP 2.0.1 commands.

pub mod clear_cache;
pub mod get_base_report;
pub mod get_variables;
pub mod request_start;
pub mod request_stop;
pub mod reset;
pub mod set_variables;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v201::outbound::notify_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ClearCache,
    GetBaseReport,
    GetVariables,
    RequestStartTransaction,
    RequestStopTransaction,
    Reset,
    SetVariables,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        Some(match action {
            "ClearCache" => Self::ClearCache,
            "GetBaseReport" => Self::GetBaseReport,
            "GetVariables" => Self::GetVariables,
            "RequestStartTransaction" => Self::RequestStartTransaction,
            "RequestStopTransaction" => Self::RequestStopTransaction,
            "Reset" => Self::Reset,
            "SetVariables" => Self::SetVariables,
            _ => return None,
        })
    }

    fn is_remote_transaction_command(action: &str) -> bool {
        matches!(
            action,
            "RequestStartTransaction" | "RequestStopTransaction"
        )
    }
}

pub async fn handle_incoming(
    station: &Arc<Station>,
    message_id: &str,
    action: &str,
    payload: &Value,
) -> Result<Value, OcppError> {
    registration_gate(station, action)?;

    let command = Action::parse(action)
        .ok_or_else(|| OcppError::NotImplemented(format!("no handler for {action}")))?;

    debug!(
        station_id = station.id(),
        message_id,
        action,
        "Dispatching command"
    );

    // The request envelope size feeds the device-model byte limits.
    let request_bytes = payload.to_string().len();

    match command {
        Action::ClearCache => respond(clear_cache::handle(station, decode(action, payload)?).await?),
        Action::GetBaseReport => get_base_report::handle(station, payload).await,
        Action::GetVariables => respond(
            get_variables::handle(station, decode(action, payload)?, request_bytes).await?,
        ),
        Action::RequestStartTransaction => {
            respond(request_start::handle(station, decode(action, payload)?).await?)
        }
        Action::RequestStopTransaction => {
            respond(request_stop::handle(station, decode(action, payload)?).await?)
        }
        Action::Reset => respond(reset::handle(station, decode(action, payload)?).await?),
        Action::SetVariables => respond(
            set_variables::handle(station, decode(action, payload)?, request_bytes).await?,
        ),
    }
}

/// Peripheral emissions that must follow the synchronous CALLRESULT.
pub async fn post_reply(station: &Arc<Station>, action: &str) {
    if action == "GetBaseReport" {
        notify_report::flush_pending(station).await;
    }
}

/// 2.0.1 stations also answer while Pending (the CSMS configures them in
/// that state), but remote transaction commands stay gated.
fn registration_gate(station: &Arc<Station>, action: &str) -> Result<(), OcppError> {
    if Action::is_remote_transaction_command(action)
        && station.in_pending_state()
        && station.strict_compliance()
    {
        return Err(OcppError::SecurityError(format!(
            "{action} refused while registration is pending"
        )));
    }
    let allowed = station.is_registered()
        || station.in_pending_state()
        || (station.in_unknown_state() && !station.strict_compliance());
    if !allowed {
        return Err(OcppError::SecurityError(format!(
            "station is not accepted by the CSMS, refusing {action}"
        )));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(action: &str, payload: &Value) -> Result<T, OcppError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| OcppError::FormationViolation(format!("{action}: {e}")))
}

fn respond<T: Serialize>(response: T) -> Result<Value, OcppError> {
    serde_json::to_value(&response).map_err(|e| OcppError::InternalError(e.to_string()))
}

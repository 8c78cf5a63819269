//! Station-initiated OCPP 2.0.1 requests.

pub mod boot_notification;
pub mod heartbeat;
pub mod notify_report;
pub mod status_notification;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub(crate) async fn call<Req, Resp>(
    station: &Arc<Station>,
    action: &str,
    request: &Req,
    opts: CallOptions,
) -> Result<Resp, OcppError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload: Value = serde_json::to_value(request)
        .map_err(|e| OcppError::InternalError(format!("{action} payload: {e}")))?;
    let raw = station.router().call(action, payload, &opts).await?;
    serde_json::from_value(raw)
        .map_err(|e| OcppError::FormationViolation(format!("{action} response: {e}")))
}

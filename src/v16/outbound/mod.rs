//! Station-initiated OCPP 1.6 requests.
//!
//! Each command module builds its typed `rust_ocpp` payload, sends it
//! through the router and applies the station-side consequences of the
//! response. Outbound payloads come straight from typed structs, so a
//! serialization failure is a programmer error and surfaces as
//! `InternalError`; replies are decoded against the typed response and a
//! mismatch surfaces as `FormationViolation`.

pub mod authorize;
pub mod boot_notification;
pub mod data_transfer;
pub mod heartbeat;
pub mod meter_values;
pub mod notifications;
pub mod start_transaction;
pub mod status_notification;
pub mod stop_transaction;

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

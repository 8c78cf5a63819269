//! GetCompositeSchedule.
//!
//! No cross-profile merging: the answer echoes the schedule of the highest
//! stack-level profile installed on the connector, or Accepted with no
//! schedule when none is installed.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(station: &Arc<Station>, req: Value) -> Result<Value, OcppError> {
    let connector_id = req
        .get("connectorId")
        .and_then(Value::as_u64)
        .ok_or_else(|| OcppError::FormationViolation("GetCompositeSchedule: connectorId".into()))?
        as u32;
    if !station.has_connector(connector_id) {
        return Ok(json!({"status": "Rejected"}));
    }

    let schedule = station
        .read_connector(connector_id, |c| {
            c.charging_profiles
                .iter()
                .max_by_key(|p| p.stack_level().unwrap_or(0))
                .and_then(|p| p.schedules().first().cloned().cloned())
        })
        .flatten();

    Ok(match schedule {
        Some(schedule) => json!({
            "status": "Accepted",
            "connectorId": connector_id,
            "scheduleStart": chrono::Utc::now().to_rfc3339(),
            "chargingSchedule": schedule,
        }),
        None => json!({"status": "Accepted", "connectorId": connector_id}),
    })
}

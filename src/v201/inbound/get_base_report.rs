//! GetBaseReport.
//!
//! The synchronous answer only classifies the request; the NotifyReport
//! sequence follows once the CALLRESULT is on the wire (post-reply hook).

use std::sync::Arc;

use rust_ocpp::v2_0_1::enumerations::report_base_enum_type::ReportBaseEnumType;
use serde_json::{json, Value};
use tracing::info;

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(station: &Arc<Station>, payload: &Value) -> Result<Value, OcppError> {
    let request_id = payload
        .get("requestId")
        .and_then(Value::as_i64)
        .ok_or_else(|| OcppError::FormationViolation("GetBaseReport: requestId".into()))?
        as i32;
    let report_base = payload
        .get("reportBase")
        .and_then(Value::as_str)
        .ok_or_else(|| OcppError::FormationViolation("GetBaseReport: reportBase".into()))?;

    let base = match report_base {
        "ConfigurationInventory" => ReportBaseEnumType::ConfigurationInventory,
        "FullInventory" => ReportBaseEnumType::FullInventory,
        "SummaryInventory" => ReportBaseEnumType::SummaryInventory,
        other => {
            info!(
                station_id = station.id(),
                report_base = other,
                "Unsupported report base"
            );
            return Ok(json!({"status": "NotSupported"}));
        }
    };

    let report = station.variable_manager().build_report(station, &base);
    if report.is_empty() {
        return Ok(json!({"status": "EmptyResultSet"}));
    }

    info!(
        station_id = station.id(),
        request_id,
        report_base,
        items = report.len(),
        "Report prepared"
    );
    station.report_cache().insert(request_id, report);
    Ok(json!({"status": "Accepted"}))
}

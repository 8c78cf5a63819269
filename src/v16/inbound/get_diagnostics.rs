//! GetDiagnostics.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::get_diagnostics::{GetDiagnosticsRequest, GetDiagnosticsResponse};

use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::diagnostics;

pub async fn handle(
    station: &Arc<Station>,
    req: GetDiagnosticsRequest,
) -> Result<GetDiagnosticsResponse, OcppError> {
    let file_name = diagnostics::upload_diagnostics(station, &req.location).await?;
    Ok(GetDiagnosticsResponse { file_name })
}

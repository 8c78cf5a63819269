//! GetVariables — delegated to the device model.

use std::sync::Arc;

use rust_ocpp::v2_0_1::messages::get_variables::{GetVariablesRequest, GetVariablesResponse};

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(
    station: &Arc<Station>,
    req: GetVariablesRequest,
    request_bytes: usize,
) -> Result<GetVariablesResponse, OcppError> {
    let get_variable_result = station.variable_manager().get_variables(
        station,
        &req.get_variable_data,
        request_bytes,
    );
    Ok(GetVariablesResponse {
        get_variable_result,
    })
}

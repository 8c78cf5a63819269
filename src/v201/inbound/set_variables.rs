//! SetVariables — delegated to the device model.

use std::sync::Arc;

use rust_ocpp::v2_0_1::messages::set_variables::{SetVariablesRequest, SetVariablesResponse};

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(
    station: &Arc<Station>,
    req: SetVariablesRequest,
    request_bytes: usize,
) -> Result<SetVariablesResponse, OcppError> {
    let set_variable_result = station.variable_manager().set_variables(
        station,
        &req.set_variable_data,
        request_bytes,
    );
    Ok(SetVariablesResponse {
        set_variable_result,
    })
}

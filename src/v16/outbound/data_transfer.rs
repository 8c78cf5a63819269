//! Station-initiated DataTransfer.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::data_transfer::{DataTransferRequest, DataTransferResponse};
use rust_ocpp::v1_6::types::DataTransferStatus;

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn send(
    station: &Arc<Station>,
    vendor_id: &str,
    message_id: Option<&str>,
    data: Option<String>,
) -> Result<(DataTransferStatus, Option<String>), OcppError> {
    let request = DataTransferRequest {
        vendor_string: vendor_id.to_string(),
        message_id: message_id.map(str::to_owned),
        data,
    };
    let response: DataTransferResponse =
        super::call(station, "DataTransfer", &request, CallOptions::default()).await?;
    Ok((response.status, response.data))
}

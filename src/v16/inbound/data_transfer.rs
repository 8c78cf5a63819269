//! Inbound DataTransfer — pure function of the vendor id.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::data_transfer::{DataTransferRequest, DataTransferResponse};
use rust_ocpp::v1_6::types::DataTransferStatus;

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(
    station: &Arc<Station>,
    req: DataTransferRequest,
) -> Result<DataTransferResponse, OcppError> {
    let recognized = station
        .config()
        .data_transfer_vendor_ids
        .iter()
        .any(|v| v == &req.vendor_string);

    Ok(DataTransferResponse {
        status: if recognized {
            DataTransferStatus::Accepted
        } else {
            DataTransferStatus::UnknownVendorId
        },
        data: None,
    })
}

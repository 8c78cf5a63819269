//! ClearCache (2.0.1).

use std::sync::Arc;

use rust_ocpp::v2_0_1::enumerations::clear_cache_status_enum_type::ClearCacheStatusEnumType;
use rust_ocpp::v2_0_1::messages::clear_cache::{ClearCacheRequest, ClearCacheResponse};
use tracing::info;

use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(
    station: &Arc<Station>,
    _req: ClearCacheRequest,
) -> Result<ClearCacheResponse, OcppError> {
    station.clear_authorized_tags();
    info!(station_id = station.id(), "Authorization cache cleared");
    Ok(ClearCacheResponse {
        status: ClearCacheStatusEnumType::Accepted,
        status_info: None,
    })
}

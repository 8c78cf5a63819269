//! ClearCache — drop the authorized-tags cache.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::clear_cache::{ClearCacheRequest, ClearCacheResponse};
use rust_ocpp::v1_6::types::ClearCacheStatus;
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
        status: ClearCacheStatus::Accepted,
    })
}

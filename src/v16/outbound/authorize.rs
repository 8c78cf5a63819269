//! Authorize and its response handling.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::types::AuthorizationStatus;
use tracing::info;

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Ask the CSMS to authorize `id_tag` for a connector. The connector's
/// `authorize_id_tag` is pinned before the request; on acceptance the
/// connector is marked authorized, on refusal the pin is cleared.
pub async fn send(
    station: &Arc<Station>,
    connector_id: u32,
    id_tag: &str,
) -> Result<bool, OcppError> {
    station.with_connector(connector_id, |c| {
        c.authorize_id_tag = Some(id_tag.to_string());
    });

    let request = AuthorizeRequest {
        id_tag: id_tag.to_string(),
    };
    let response: AuthorizeResponse =
        super::call(station, "Authorize", &request, CallOptions::default()).await?;

    let accepted = response.id_tag_info.status == AuthorizationStatus::Accepted;
    station.with_connector(connector_id, |c| {
        if c.authorize_id_tag.as_deref() == Some(id_tag) {
            c.id_tag_authorized = accepted;
            if !accepted {
                c.authorize_id_tag = None;
            }
        }
    });
    station.cache_authorized_tag(id_tag, accepted);

    info!(
        station_id = station.id(),
        connector_id,
        id_tag,
        accepted,
        "Authorize answered"
    );
    Ok(accepted)
}

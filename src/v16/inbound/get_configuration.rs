//! GetConfiguration.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::get_configuration::{
    GetConfigurationRequest, GetConfigurationResponse,
};
use rust_ocpp::v1_6::types::KeyValue;

use crate::domain::configuration::ConfigurationKey;
use crate::station::Station;
use crate::support::errors::OcppError;

fn to_key_value(entry: ConfigurationKey) -> KeyValue {
    KeyValue {
        key: entry.key,
        readonly: entry.readonly,
        value: Some(entry.value),
    }
}

pub async fn handle(
    station: &Arc<Station>,
    req: GetConfigurationRequest,
) -> Result<GetConfigurationResponse, OcppError> {
    let store = station.configuration();
    let (known, unknown) = match req.key {
        // No filter: everything that is not hidden.
        None => (store.visible(), Vec::new()),
        Some(names) => store.select(&names),
    };

    Ok(GetConfigurationResponse {
        configuration_key: Some(known.into_iter().map(to_key_value).collect()),
        unknown_key: if unknown.is_empty() {
            None
        } else {
            Some(unknown)
        },
    })
}

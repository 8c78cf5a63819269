//! ChangeConfiguration.
//!
//! The two heartbeat keys mirror each other: a write to either spelling
//! stores both and restarts the heartbeat task. `WebSocketPingInterval`
//! restarts the keep-alive. Writing the stored value back is Accepted with
//! no side effect.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::change_configuration::{
    ChangeConfigurationRequest, ChangeConfigurationResponse,
};
use rust_ocpp::v1_6::types::ConfigurationStatus;
use tracing::info;

use crate::domain::configuration::{keys, SetKeyOutcome};
use crate::station::{tasks, Station};
use crate::support::errors::OcppError;

fn is_heartbeat_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(keys::HEARTBEAT_INTERVAL)
        || key.eq_ignore_ascii_case(keys::HEARTBEAT_INTERVAL_LEGACY)
}

pub async fn handle(
    station: &Arc<Station>,
    req: ChangeConfigurationRequest,
) -> Result<ChangeConfigurationResponse, OcppError> {
    let outcome = station.configuration().set_value(&req.key, &req.value);
    let status = match outcome {
        SetKeyOutcome::Unknown => ConfigurationStatus::NotSupported,
        SetKeyOutcome::ReadOnly => ConfigurationStatus::Rejected,
        SetKeyOutcome::Unchanged => ConfigurationStatus::Accepted,
        SetKeyOutcome::Changed { reboot_required } => {
            apply_side_effects(station, &req.key, &req.value);
            if reboot_required {
                ConfigurationStatus::RebootRequired
            } else {
                ConfigurationStatus::Accepted
            }
        }
    };

    info!(
        station_id = station.id(),
        key = req.key.as_str(),
        value = req.value.as_str(),
        ?status,
        "ChangeConfiguration handled"
    );
    Ok(ChangeConfigurationResponse { status })
}

fn apply_side_effects(station: &Arc<Station>, key: &str, value: &str) {
    if is_heartbeat_key(key) {
        if let Ok(seconds) = value.trim().parse::<i64>() {
            station.apply_heartbeat_interval(seconds);
        }
    } else if key.eq_ignore_ascii_case(keys::WEB_SOCKET_PING_INTERVAL) {
        tasks::restart_ws_ping(station);
    }
}

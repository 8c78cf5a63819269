//! CSMS-initiated OCPP 1.6 commands.
//!
//! `handle_incoming` runs the shared pipeline: registration gate, feature
//! profile check, schema-driven decode, dispatch. Each command lives in its
//! own module and gets the station by reference per call.

pub mod cancel_reservation;
pub mod change_availability;
pub mod change_configuration;
pub mod clear_cache;
pub mod clear_charging_profile;
pub mod data_transfer;
pub mod get_composite_schedule;
pub mod get_configuration;
pub mod get_diagnostics;
pub mod remote_start;
pub mod remote_stop;
pub mod reset;
pub mod reserve_now;
pub mod set_charging_profile;
pub mod trigger_message;
pub mod unlock_connector;
pub mod update_firmware;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::configuration::keys;
use crate::station::Station;
use crate::support::errors::OcppError;

/// Commands this dialect accepts, one variant per wire action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CancelReservation,
    ChangeAvailability,
    ChangeConfiguration,
    ClearCache,
    ClearChargingProfile,
    DataTransfer,
    GetCompositeSchedule,
    GetConfiguration,
    GetDiagnostics,
    RemoteStartTransaction,
    RemoteStopTransaction,
    Reset,
    ReserveNow,
    SetChargingProfile,
    TriggerMessage,
    UnlockConnector,
    UpdateFirmware,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        Some(match action {
            "CancelReservation" => Self::CancelReservation,
            "ChangeAvailability" => Self::ChangeAvailability,
            "ChangeConfiguration" => Self::ChangeConfiguration,
            "ClearCache" => Self::ClearCache,
            "ClearChargingProfile" => Self::ClearChargingProfile,
            "DataTransfer" => Self::DataTransfer,
            "GetCompositeSchedule" => Self::GetCompositeSchedule,
            "GetConfiguration" => Self::GetConfiguration,
            "GetDiagnostics" => Self::GetDiagnostics,
            "RemoteStartTransaction" => Self::RemoteStartTransaction,
            "RemoteStopTransaction" => Self::RemoteStopTransaction,
            "Reset" => Self::Reset,
            "ReserveNow" => Self::ReserveNow,
            "SetChargingProfile" => Self::SetChargingProfile,
            "TriggerMessage" => Self::TriggerMessage,
            "UnlockConnector" => Self::UnlockConnector,
            "UpdateFirmware" => Self::UpdateFirmware,
            _ => return None,
        })
    }

    /// Feature profile that must appear in `SupportedFeatureProfiles`.
    fn feature_profile(&self) -> &'static str {
        match self {
            Self::ChangeAvailability
            | Self::ChangeConfiguration
            | Self::ClearCache
            | Self::DataTransfer
            | Self::GetConfiguration
            | Self::RemoteStartTransaction
            | Self::RemoteStopTransaction
            | Self::Reset
            | Self::UnlockConnector => "Core",
            Self::GetDiagnostics | Self::UpdateFirmware => "FirmwareManagement",
            Self::ClearChargingProfile | Self::GetCompositeSchedule | Self::SetChargingProfile => {
                "SmartCharging"
            }
            Self::TriggerMessage => "RemoteTrigger",
            Self::CancelReservation | Self::ReserveNow => "Reservation",
        }
    }

    fn is_remote_transaction_command(action: &str) -> bool {
        matches!(action, "RemoteStartTransaction" | "RemoteStopTransaction")
    }
}

pub async fn handle_incoming(
    station: &Arc<Station>,
    message_id: &str,
    action: &str,
    payload: &Value,
) -> Result<Value, OcppError> {
    registration_gate(station, action)?;

    let command = Action::parse(action)
        .ok_or_else(|| OcppError::NotImplemented(format!("no handler for {action}")))?;
    ensure_profile_enabled(station, command)?;

    debug!(
        station_id = station.id(),
        message_id,
        action,
        "Dispatching command"
    );

    match command {
        Action::CancelReservation => {
            respond(cancel_reservation::handle(station, decode(action, payload)?).await?)
        }
        Action::ChangeAvailability => {
            respond(change_availability::handle(station, decode(action, payload)?).await?)
        }
        Action::ChangeConfiguration => {
            respond(change_configuration::handle(station, decode(action, payload)?).await?)
        }
        Action::ClearCache => respond(clear_cache::handle(station, decode(action, payload)?).await?),
        Action::ClearChargingProfile => {
            respond(clear_charging_profile::handle(station, decode(action, payload)?).await?)
        }
        Action::DataTransfer => {
            respond(data_transfer::handle(station, decode(action, payload)?).await?)
        }
        Action::GetCompositeSchedule => {
            get_composite_schedule::handle(station, decode(action, payload)?).await
        }
        Action::GetConfiguration => {
            respond(get_configuration::handle(station, decode(action, payload)?).await?)
        }
        Action::GetDiagnostics => {
            respond(get_diagnostics::handle(station, decode(action, payload)?).await?)
        }
        Action::RemoteStartTransaction => {
            respond(remote_start::handle(station, decode(action, payload)?).await?)
        }
        Action::RemoteStopTransaction => {
            respond(remote_stop::handle(station, decode(action, payload)?).await?)
        }
        Action::Reset => respond(reset::handle(station, decode(action, payload)?).await?),
        Action::ReserveNow => respond(reserve_now::handle(station, decode(action, payload)?).await?),
        Action::SetChargingProfile => {
            respond(set_charging_profile::handle(station, decode(action, payload)?).await?)
        }
        Action::TriggerMessage => {
            respond(trigger_message::handle(station, decode(action, payload)?).await?)
        }
        Action::UnlockConnector => {
            respond(unlock_connector::handle(station, decode(action, payload)?).await?)
        }
        Action::UpdateFirmware => {
            respond(update_firmware::handle(station, decode(action, payload)?).await?)
        }
    }
}

/// The station answers commands only once the CSMS accepted it, except
/// that an unregistered station is tolerated when strict compliance is
/// off. Remote transaction commands are additionally refused while the
/// registration is still Pending under strict compliance.
fn registration_gate(station: &Arc<Station>, action: &str) -> Result<(), OcppError> {
    if Action::is_remote_transaction_command(action)
        && station.in_pending_state()
        && station.strict_compliance()
    {
        return Err(OcppError::SecurityError(format!(
            "{action} refused while registration is pending"
        )));
    }
    let allowed =
        station.is_registered() || (station.in_unknown_state() && !station.strict_compliance());
    if !allowed {
        return Err(OcppError::SecurityError(format!(
            "station is not accepted by the CSMS, refusing {action}"
        )));
    }
    Ok(())
}

fn ensure_profile_enabled(station: &Arc<Station>, command: Action) -> Result<(), OcppError> {
    let profile = command.feature_profile();
    let enabled = station
        .configuration()
        .value(keys::SUPPORTED_FEATURE_PROFILES)
        .map(|list| list.split(',').any(|p| p.trim() == profile))
        .unwrap_or(false);
    if enabled {
        Ok(())
    } else {
        Err(OcppError::NotImplemented(format!(
            "feature profile {profile} is disabled"
        )))
    }
}

fn decode<T: DeserializeOwned>(action: &str, payload: &Value) -> Result<T, OcppError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| OcppError::FormationViolation(format!("{action}: {e}")))
}

fn respond<T: Serialize>(response: T) -> Result<Value, OcppError> {
    serde_json::to_value(&response).map_err(|e| OcppError::InternalError(e.to_string()))
}

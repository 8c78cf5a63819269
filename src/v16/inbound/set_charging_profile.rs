//! SetChargingProfile.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::set_charging_profile::{
    SetChargingProfileRequest, SetChargingProfileResponse,
};
use rust_ocpp::v1_6::types::ChargingProfileStatus;
use tracing::{info, warn};

use crate::domain::charging_profile::{self, ProfileContext, StoredChargingProfile};
use crate::domain::configuration::keys;
use crate::station::Station;
use crate::support::errors::OcppError;

pub async fn handle(
    station: &Arc<Station>,
    req: SetChargingProfileRequest,
) -> Result<SetChargingProfileResponse, OcppError> {
    let connector_id = req.connector_id;
    if connector_id < 0 || !station.has_connector(connector_id as u32) {
        return Ok(SetChargingProfileResponse {
            status: ChargingProfileStatus::Rejected,
        });
    }
    let connector_id = connector_id as u32;

    let value = serde_json::to_value(&req.cs_charging_profiles)
        .map_err(|e| OcppError::InternalError(format!("charging profile: {e}")))?;
    let profile = StoredChargingProfile::from_value(value);

    let ctx = ProfileContext {
        connector_id: connector_id as i64,
        connector_has_transaction: station
            .read_connector(connector_id, |c| c.has_active_transaction())
            .unwrap_or(false),
        max_stack_level: station
            .configuration()
            .int_value(keys::CHARGE_PROFILE_MAX_STACK_LEVEL)
            .unwrap_or(9),
    };
    if let Err(reason) = charging_profile::validate(&profile, &ctx, chrono::Utc::now()) {
        warn!(
            station_id = station.id(),
            connector_id, reason, "SetChargingProfile rejected"
        );
        return Ok(SetChargingProfileResponse {
            status: ChargingProfileStatus::Rejected,
        });
    }

    let profile_id = profile.id();
    station.with_connector(connector_id, |c| {
        // A profile resubmitted with the same id replaces its predecessor.
        c.charging_profiles.retain(|p| p.id() != profile_id);
        c.charging_profiles.push(profile);
    });

    info!(
        station_id = station.id(),
        connector_id,
        profile_id = ?profile_id,
        "Charging profile installed"
    );
    Ok(SetChargingProfileResponse {
        status: ChargingProfileStatus::Accepted,
    })
}

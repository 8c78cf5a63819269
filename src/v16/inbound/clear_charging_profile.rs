//! ClearChargingProfile.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::clear_charging_profile::{
    ClearChargingProfileRequest, ClearChargingProfileResponse,
};
use rust_ocpp::v1_6::types::{ChargingProfilePurposeType, ClearChargingProfileStatus};
use tracing::info;

use crate::domain::charging_profile::{clear_matches, ClearProfileCriteria};
use crate::station::Station;
use crate::support::errors::OcppError;

fn purpose_name(purpose: &ChargingProfilePurposeType) -> &'static str {
    match purpose {
        ChargingProfilePurposeType::ChargePointMaxProfile => "ChargePointMaxProfile",
        ChargingProfilePurposeType::TxDefaultProfile => "TxDefaultProfile",
        ChargingProfilePurposeType::TxProfile => "TxProfile",
    }
}

pub async fn handle(
    station: &Arc<Station>,
    req: ClearChargingProfileRequest,
) -> Result<ClearChargingProfileResponse, OcppError> {
    let criteria = ClearProfileCriteria {
        id: req.id.map(i64::from),
        purpose: req.charging_profile_purpose.as_ref().map(|p| purpose_name(p).to_string()),
        stack_level: req.stack_level.map(i64::from),
    };

    let target_connectors: Vec<u32> = match req.connector_id {
        Some(id) if id >= 0 => vec![id as u32],
        Some(_) => Vec::new(),
        None => {
            let mut ids = station.connector_ids();
            ids.insert(0, 0);
            ids
        }
    };

    let mut removed = 0usize;
    for connector_id in target_connectors {
        removed += station
            .with_connector(connector_id, |c| {
                let before = c.charging_profiles.len();
                c.charging_profiles.retain(|p| !clear_matches(p, &criteria));
                before - c.charging_profiles.len()
            })
            .unwrap_or(0);
    }

    info!(station_id = station.id(), removed, "ClearChargingProfile handled");
    Ok(ClearChargingProfileResponse {
        status: if removed > 0 {
            ClearChargingProfileStatus::Accepted
        } else {
            ClearChargingProfileStatus::Unknown
        },
    })
}

//! RequestStartTransaction.
//!
//! The EVSE is mandatory; the idToken (and the group idToken when present)
//! must be authorized locally — 2.0.1 stations do not ask the CSMS back.
//! A new UUID transaction id is minted, the per-transaction counters are
//! reset, the connector moves to Occupied, and TransactionEvent(Started)
//! goes out with triggerReason RemoteStart. Any failure after the state
//! mutation rolls the connector back.

use std::sync::Arc;

use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::request_start_stop_status_enum_type::RequestStartStopStatusEnumType;
use rust_ocpp::v2_0_1::messages::request_start_transaction::{
    RequestStartTransactionRequest, RequestStartTransactionResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::charging_profile::{self, ProfileContext, StoredChargingProfile};
use crate::domain::configuration::keys;
use crate::domain::connector::TransactionId;
use crate::station::{tasks, Station};
use crate::support::errors::OcppError;
use crate::v201::outbound::status_notification;
use crate::v201::transaction_event;
use crate::v201::trigger_reason::{RemoteCommand, TriggerContext};

fn rejected() -> RequestStartTransactionResponse {
    RequestStartTransactionResponse {
        status: RequestStartStopStatusEnumType::Rejected,
        transaction_id: None,
        status_info: None,
    }
}

fn token_authorized(station: &Arc<Station>, token: &str) -> bool {
    station.is_locally_authorized(token)
        || station.cached_tag_authorization(token) == Some(true)
}

pub async fn handle(
    station: &Arc<Station>,
    req: RequestStartTransactionRequest,
) -> Result<RequestStartTransactionResponse, OcppError> {
    let Some(evse_id) = req
        .evse_id
        .filter(|id| *id > 0 && station.has_evse(*id as u32))
    else {
        warn!(
            station_id = station.id(),
            evse_id = ?req.evse_id,
            "RequestStartTransaction needs a known EVSE"
        );
        return Ok(rejected());
    };
    let evse_id = evse_id as u32;

    let (busy, operative) = station
        .read_connector(evse_id, |c| (c.has_active_transaction(), c.is_operative()))
        .unwrap_or((false, false));
    if busy || !operative {
        return Ok(rejected());
    }

    if !token_authorized(station, &req.id_token.id_token) {
        warn!(
            station_id = station.id(),
            id_token = req.id_token.id_token.as_str(),
            "Remote start token not authorized"
        );
        return Ok(rejected());
    }
    if let Some(group) = &req.group_id_token {
        if !token_authorized(station, &group.id_token) {
            warn!(
                station_id = station.id(),
                group_id_token = group.id_token.as_str(),
                "Remote start group token not authorized"
            );
            return Ok(rejected());
        }
    }

    let profile = match &req.charging_profile {
        Some(profile) => {
            let value = serde_json::to_value(profile)
                .map_err(|e| OcppError::InternalError(format!("charging profile: {e}")))?;
            let stored = StoredChargingProfile::from_value(value);
            if !stored.is_tx_profile() {
                return Ok(rejected());
            }
            let ctx = ProfileContext {
                connector_id: evse_id as i64,
                connector_has_transaction: true,
                max_stack_level: station
                    .configuration()
                    .int_value(keys::CHARGE_PROFILE_MAX_STACK_LEVEL)
                    .unwrap_or(9),
            };
            if let Err(reason) = charging_profile::validate(&stored, &ctx, chrono::Utc::now()) {
                warn!(
                    station_id = station.id(),
                    evse_id, reason, "Remote start profile rejected"
                );
                return Ok(rejected());
            }
            Some(stored)
        }
        None => None,
    };

    let previous_status = station.connector_status(evse_id);
    status_notification::update_and_notify(station, evse_id, ConnectorStatusEnumType::Occupied)
        .await?;

    let transaction_id = Uuid::new_v4().to_string();
    station.with_connector(evse_id, |c| {
        // Fresh transaction: seq_no and the first-emission markers restart.
        c.clear_transaction();
        c.begin_transaction(
            TransactionId::Uuid(transaction_id.clone()),
            Some(req.id_token.id_token.clone()),
            chrono::Utc::now(),
        );
        c.transaction_remote_started = true;
        c.remote_start_id = Some(req.remote_start_id);
        if let Some(profile) = profile {
            let profile_id = profile.id();
            c.charging_profiles.retain(|p| p.id() != profile_id);
            c.charging_profiles.push(profile);
        }
    });

    let ctx = TriggerContext::remote(RemoteCommand::RequestStart);
    let result = transaction_event::send_started(
        station,
        evse_id,
        &ctx,
        Some(req.id_token.clone()),
        Some(req.remote_start_id),
    )
    .await;

    match result {
        Ok(_) => {
            station.increment_power_divider();
            tasks::start_meter_values(station, evse_id);
            info!(
                station_id = station.id(),
                evse_id,
                transaction_id = transaction_id.as_str(),
                "Remote start accepted"
            );
            Ok(RequestStartTransactionResponse {
                status: RequestStartStopStatusEnumType::Accepted,
                transaction_id: Some(transaction_id),
                status_info: None,
            })
        }
        Err(e) => {
            warn!(
                station_id = station.id(),
                evse_id,
                error = %e,
                "TransactionEvent(Started) failed, rolling the connector back"
            );
            station.tasks().stop_meter_values(evse_id);
            station.with_connector(evse_id, |c| {
                c.clear_transaction();
                if let Some(previous) = previous_status.clone() {
                    c.status = previous;
                }
            });
            Ok(rejected())
        }
    }
}

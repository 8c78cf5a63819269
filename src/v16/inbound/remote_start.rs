//! RemoteStartTransaction.
//!
//! The connector is optimistically moved to Preparing, then the
//! authorization and profile gates run. Any refusal reverts the connector
//! to Available (re-announcing the status when it had changed) and answers
//! Rejected.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use rust_ocpp::v1_6::types::{ChargePointStatus, RemoteStartStopStatus};
use tracing::{info, warn};

use crate::domain::charging_profile::{self, ProfileContext, StoredChargingProfile};
use crate::domain::configuration::keys;
use crate::domain::connector::ConnectorStatusValue;
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v16::outbound::{authorize, start_transaction, status_notification};

fn rejected() -> RemoteStartTransactionResponse {
    RemoteStartTransactionResponse {
        status: RemoteStartStopStatus::Rejected,
    }
}

pub async fn handle(
    station: &Arc<Station>,
    req: RemoteStartTransactionRequest,
) -> Result<RemoteStartTransactionResponse, OcppError> {
    let Some(connector_id) = req.connector_id.filter(|id| *id != 0 && station.has_connector(*id))
    else {
        warn!(
            station_id = station.id(),
            connector_id = ?req.connector_id,
            "RemoteStartTransaction for unknown connector"
        );
        return Ok(rejected());
    };

    status_notification::update_and_notify(station, connector_id, ChargePointStatus::Preparing)
        .await?;

    let station_operative = station.read_connector(0, |c| c.is_operative()).unwrap_or(true);
    let connector_operative = station
        .read_connector(connector_id, |c| c.is_operative())
        .unwrap_or(false);
    if !station_operative || !connector_operative {
        return revert(station, connector_id).await;
    }

    if station.authorize_remote_tx_requests() {
        let authorized = if station.is_locally_authorized(&req.id_tag) {
            station.with_connector(connector_id, |c| {
                c.local_authorize_id_tag = Some(req.id_tag.clone());
                c.id_tag_local_authorized = true;
            });
            true
        } else if station.config().must_authorize_at_remote_start {
            authorize::send(station, connector_id, &req.id_tag)
                .await
                .unwrap_or(false)
        } else {
            warn!(
                station_id = station.id(),
                id_tag = req.id_tag.as_str(),
                "Remote start authorization required but no path to authorize the token"
            );
            false
        };
        if !authorized {
            return revert(station, connector_id).await;
        }
    }

    if let Some(profile) = &req.charging_profile {
        let value = serde_json::to_value(profile)
            .map_err(|e| OcppError::InternalError(format!("charging profile: {e}")))?;
        let stored = StoredChargingProfile::from_value(value);
        if !stored.is_tx_profile() {
            warn!(
                station_id = station.id(),
                connector_id, "Remote start profile must be a TxProfile"
            );
            return revert(station, connector_id).await;
        }
        let ctx = ProfileContext {
            connector_id: connector_id as i64,
            // The profile belongs to the transaction this command is starting.
            connector_has_transaction: true,
            max_stack_level: station
                .configuration()
                .int_value(keys::CHARGE_PROFILE_MAX_STACK_LEVEL)
                .unwrap_or(9),
        };
        if let Err(reason) = charging_profile::validate(&stored, &ctx, chrono::Utc::now()) {
            warn!(
                station_id = station.id(),
                connector_id, reason, "Remote start profile rejected"
            );
            return revert(station, connector_id).await;
        }
        station.with_connector(connector_id, |c| c.charging_profiles.push(stored));
    }

    station.with_connector(connector_id, |c| c.transaction_remote_started = true);

    let accepted = start_transaction::send(station, connector_id, &req.id_tag, true).await?;
    if accepted {
        info!(
            station_id = station.id(),
            connector_id,
            id_tag = req.id_tag.as_str(),
            "Remote start accepted"
        );
        Ok(RemoteStartTransactionResponse {
            status: RemoteStartStopStatus::Accepted,
        })
    } else {
        // start_transaction restored the pre-start status; finish the
        // revert by announcing Available again.
        revert(station, connector_id).await
    }
}

async fn revert(
    station: &Arc<Station>,
    connector_id: u32,
) -> Result<RemoteStartTransactionResponse, OcppError> {
    let already_available = matches!(
        station.connector_status(connector_id),
        Some(ConnectorStatusValue::V16(ChargePointStatus::Available))
    );
    if !already_available {
        status_notification::update_and_notify(station, connector_id, ChargePointStatus::Available)
            .await?;
    }
    Ok(rejected())
}

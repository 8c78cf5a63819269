//! StartTransaction and its acceptance pipeline.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::types::{AuthorizationStatus, ChargePointStatus};
use tracing::{info, warn};

use crate::domain::connector::{ConnectorStatusValue, TransactionId};
use crate::router::CallOptions;
use crate::station::{tasks, Station};
use crate::support::errors::OcppError;

use super::{meter_values, status_notification};

/// Send StartTransaction for `id_tag` on a connector and apply the
/// response. Returns true when the transaction is running afterwards.
pub async fn send(
    station: &Arc<Station>,
    connector_id: u32,
    id_tag: &str,
    remote_started: bool,
) -> Result<bool, OcppError> {
    let Some((previous_status, meter_start, reservation_id)) =
        station.read_connector(connector_id, |c| {
            (
                c.status.clone(),
                c.energy_active_import_register.round() as i32,
                c.reservation
                    .as_ref()
                    .filter(|r| r.id_tag == id_tag)
                    .map(|r| r.reservation_id),
            )
        })
    else {
        return Ok(false);
    };

    let timestamp = Utc::now();
    let request = StartTransactionRequest {
        connector_id,
        id_tag: id_tag.to_string(),
        meter_start,
        reservation_id,
        timestamp,
    };
    let response: StartTransactionResponse =
        super::call(station, "StartTransaction", &request, CallOptions::default()).await?;

    let refusal = acceptance_error(station, connector_id, id_tag, remote_started, &response);
    if let Some(reason) = refusal {
        warn!(
            station_id = station.id(),
            connector_id,
            id_tag,
            reason,
            "StartTransaction not applied, rolling the connector back"
        );
        rollback(station, connector_id, previous_status).await;
        return Ok(false);
    }

    station.with_connector(connector_id, |c| {
        c.begin_transaction(
            TransactionId::Integer(response.transaction_id),
            Some(id_tag.to_string()),
            timestamp,
        );
        // A matching reservation is consumed by the transaction it gated.
        if reservation_id.is_some() {
            c.reservation = None;
        }
    });

    if station.config().transaction_data_meter_values {
        let _ = meter_values::send_transaction_begin(station, connector_id).await;
    }
    status_notification::update_and_notify(station, connector_id, ChargePointStatus::Charging)
        .await?;
    station.increment_power_divider();
    tasks::start_meter_values(station, connector_id);

    info!(
        station_id = station.id(),
        connector_id,
        transaction_id = response.transaction_id,
        "Transaction started"
    );
    Ok(true)
}

/// The ordered checks a StartTransaction response must clear before the
/// station commits the transaction.
fn acceptance_error(
    station: &Arc<Station>,
    connector_id: u32,
    id_tag: &str,
    remote_started: bool,
    response: &StartTransactionResponse,
) -> Option<&'static str> {
    if remote_started && station.authorize_remote_tx_requests() {
        let (locally_ok, remotely_ok) = station
            .read_connector(connector_id, |c| {
                (
                    c.id_tag_local_authorized
                        && c.local_authorize_id_tag.as_deref() == Some(id_tag),
                    c.id_tag_authorized && c.authorize_id_tag.as_deref() == Some(id_tag),
                )
            })
            .unwrap_or((false, false));
        if station.local_auth_list_enabled() {
            if !locally_ok && !remotely_ok {
                return Some("token not locally authorized");
            }
        } else if !remotely_ok {
            return Some("token not authorized");
        }
    }

    let status_ok = matches!(
        station.connector_status(connector_id),
        Some(ConnectorStatusValue::V16(
            ChargePointStatus::Available | ChargePointStatus::Preparing
        ))
    );
    if !status_ok {
        return Some("connector is neither Available nor Preparing");
    }

    if station
        .read_connector(connector_id, |c| c.has_active_transaction())
        .unwrap_or(false)
    {
        return Some("a transaction is already running on this connector");
    }

    if response.id_tag_info.status != AuthorizationStatus::Accepted {
        return Some("CSMS refused the transaction");
    }
    None
}

/// Undo the optimistic connector mutations after a refused start.
async fn rollback(station: &Arc<Station>, connector_id: u32, previous_status: ConnectorStatusValue) {
    station.tasks().stop_meter_values(connector_id);
    station.with_connector(connector_id, |c| {
        c.clear_transaction();
        c.status = previous_status;
    });
}

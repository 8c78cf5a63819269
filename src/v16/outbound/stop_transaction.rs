//! StopTransaction and the connector teardown it triggers.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, ChargePointStatus, Reason, ReadingContext,
};
use tracing::{info, warn};

use crate::domain::connector::StopReason;
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

use super::{meter_values, status_notification};

fn wire_reason(reason: StopReason) -> Reason {
    match reason {
        StopReason::EvDisconnected => Reason::EVDisconnected,
        StopReason::HardReset | StopReason::ImmediateReset => Reason::HardReset,
        StopReason::SoftReset => Reason::SoftReset,
        StopReason::Local => Reason::Local,
        StopReason::Remote => Reason::Remote,
        StopReason::UnlockCommand => Reason::UnlockCommand,
        StopReason::Reboot => Reason::Reboot,
        StopReason::Other => Reason::Other,
    }
}

/// Stop the transaction on a connector. Returns true when the CSMS
/// accepted the stop (no idTagInfo counts as accepted per OCPP 1.6).
pub async fn send(
    station: &Arc<Station>,
    connector_id: u32,
    reason: StopReason,
) -> Result<bool, OcppError> {
    let Some(Some((transaction_id, id_tag, register))) =
        station.read_connector(connector_id, |c| {
            c.transaction_id
                .as_ref()
                .and_then(|id| id.as_integer())
                .map(|id| {
                    (
                        id,
                        c.transaction_id_tag.clone(),
                        c.energy_active_import_register,
                    )
                })
        })
    else {
        warn!(
            station_id = station.id(),
            connector_id, "No transaction to stop"
        );
        return Ok(false);
    };

    station.tasks().stop_meter_values(connector_id);

    let transaction_data = if station.config().transaction_data_meter_values {
        Some(vec![meter_values::register_sample(
            register,
            ReadingContext::TransactionEnd,
        )])
    } else {
        None
    };

    let request = StopTransactionRequest {
        id_tag,
        meter_stop: register.round() as i32,
        timestamp: Utc::now(),
        transaction_id,
        reason: Some(wire_reason(reason)),
        transaction_data,
    };
    let response: StopTransactionResponse =
        super::call(station, "StopTransaction", &request, CallOptions::default()).await?;

    if !station.strict_compliance() && station.config().out_of_order_end_meter_values {
        let _ = meter_values::send_transaction_end(station, connector_id).await;
    }

    let station_inoperative = station
        .read_connector(0, |c| !c.is_operative())
        .unwrap_or(false);
    let connector_inoperative = station
        .read_connector(connector_id, |c| !c.is_operative())
        .unwrap_or(false);
    let next_status = if station_inoperative || connector_inoperative {
        ChargePointStatus::Unavailable
    } else {
        ChargePointStatus::Available
    };
    status_notification::update_and_notify(station, connector_id, next_status).await?;

    station.decrement_power_divider();
    station.with_connector(connector_id, |c| c.clear_transaction());

    let accepted = response
        .id_tag_info
        .map(|info| info.status == AuthorizationStatus::Accepted)
        .unwrap_or(true);
    info!(
        station_id = station.id(),
        connector_id, transaction_id, accepted, "Transaction stopped"
    );
    Ok(accepted)
}

//! TransactionEvent building, sequencing and the offline queue.
//!
//! Sequence numbers are per transaction and monotonic (0, 1, 2, …); the
//! `evse` block and the `idToken` are attached to the first event that can
//! carry them and never repeated. Events produced while the socket is down
//! are queued on the connector and drained in order on reconnect.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_ocpp::v2_0_1::datatypes::evse_type::EVSEType;
use rust_ocpp::v2_0_1::datatypes::id_token_type::IdTokenType;
use rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType;
use rust_ocpp::v2_0_1::datatypes::sampled_value_type::SampledValueType;
use rust_ocpp::v2_0_1::datatypes::transaction_type::TransactionType;
use rust_ocpp::v2_0_1::datatypes::unit_of_measure_type::UnitOfMeasureType;
use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::measurand_enum_type::MeasurandEnumType;
use rust_ocpp::v2_0_1::enumerations::reading_context_enum_type::ReadingContextEnumType;
use rust_ocpp::v2_0_1::enumerations::reason_enum_type::ReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::messages::transaction_event::{
    TransactionEventRequest, TransactionEventResponse,
};
use tracing::{info, warn};

use crate::domain::connector::{QueuedTransactionEvent, StopReason};
use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;
use crate::v201::outbound::status_notification;
use crate::v201::trigger_reason::{
    self, CableAction, LocalAuthorization, RemoteCommand, TriggerContext,
};

/// Hard limit OCPP 2.0.1 puts on `transactionInfo.transactionId`.
const MAX_TRANSACTION_ID_LEN: usize = 36;

/// Optional payload pieces a caller may attach to an event.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    pub id_token: Option<IdTokenType>,
    pub meter_value: Option<Vec<MeterValueType>>,
    pub charging_state: Option<ChargingStateEnumType>,
    pub stopped_reason: Option<ReasonEnumType>,
    pub remote_start_id: Option<i32>,
    pub cable_max_current: Option<i32>,
    pub number_of_phases_used: Option<i32>,
    pub offline: Option<bool>,
    pub reservation_id: Option<i32>,
}

/// Energy.Active.Import.Register sample for the event payload.
pub(crate) fn register_sample(register_wh: f64, context: ReadingContextEnumType) -> MeterValueType {
    MeterValueType {
        timestamp: Utc::now(),
        sampled_value: vec![SampledValueType {
            value: Decimal::from_f64(register_wh).unwrap_or_default(),
            context: Some(context),
            measurand: Some(MeasurandEnumType::EnergyActiveImportRegister),
            phase: None,
            location: None,
            signed_meter_value: None,
            unit_of_measure: Some(UnitOfMeasureType {
                unit: Some("Wh".to_string()),
                multiplier: None,
            }),
        }],
    }
}

/// Assemble the next event for the transaction on `evse_id`, consuming one
/// sequence number and the one-shot `evse`/`idToken` inclusions.
pub fn build_event(
    station: &Arc<Station>,
    evse_id: u32,
    event_type: TransactionEventEnumType,
    ctx: &TriggerContext,
    opts: EventOptions,
) -> Result<TransactionEventRequest, OcppError> {
    let trigger_reason = trigger_reason::select(ctx);
    station
        .with_connector(evse_id, |c| {
            let transaction_id = c
                .transaction_id
                .as_ref()
                .and_then(|t| t.as_uuid())
                .map(str::to_owned)
                .ok_or_else(|| {
                    OcppError::PropertyConstraintViolation(
                        "transactionId must be a non-empty string".to_string(),
                    )
                })?;
            if transaction_id.is_empty() || transaction_id.len() > MAX_TRANSACTION_ID_LEN {
                return Err(OcppError::PropertyConstraintViolation(format!(
                    "transactionId must be 1..={MAX_TRANSACTION_ID_LEN} chars"
                )));
            }

            let seq_no = c.next_seq_no();
            let evse = if c.transaction_evse_sent {
                None
            } else {
                c.transaction_evse_sent = true;
                Some(EVSEType {
                    id: evse_id as i32,
                    connector_id: Some(1),
                })
            };
            let id_token = match &opts.id_token {
                Some(token) if !c.transaction_id_token_sent => {
                    c.transaction_id_token_sent = true;
                    Some(token.clone())
                }
                _ => None,
            };

            Ok(TransactionEventRequest {
                event_type: event_type.clone(),
                timestamp: Utc::now(),
                trigger_reason: trigger_reason.clone(),
                seq_no,
                offline: opts.offline,
                number_of_phases_used: opts.number_of_phases_used,
                cable_max_current: opts.cable_max_current,
                reservation_id: opts.reservation_id,
                transaction_info: TransactionType {
                    transaction_id,
                    charging_state: opts.charging_state.clone(),
                    time_spent_charging: None,
                    stopped_reason: opts.stopped_reason.clone(),
                    remote_start_id: opts.remote_start_id,
                },
                id_token,
                evse,
                meter_value: opts.meter_value.clone(),
            })
        })
        .unwrap_or_else(|| {
            Err(OcppError::GenericError(format!("unknown EVSE {evse_id}")))
        })
}

fn synthetic_response() -> TransactionEventResponse {
    TransactionEventResponse {
        total_cost: None,
        charging_priority: None,
        id_token_info: None,
        updated_personal_message: None,
    }
}

/// Send an event, or queue it when the socket is down. Queued events get
/// the `offline` marker and a synthetic empty response.
pub async fn send_or_queue(
    station: &Arc<Station>,
    evse_id: u32,
    mut request: TransactionEventRequest,
) -> Result<TransactionEventResponse, OcppError> {
    if !station.router().is_open() {
        request.offline = Some(true);
        let seq_no = request.seq_no;
        station.with_connector(evse_id, |c| {
            c.transaction_event_queue.push_back(QueuedTransactionEvent {
                request,
                seq_no,
                queued_at: Utc::now(),
            });
        });
        info!(
            station_id = station.id(),
            evse_id, seq_no, "Socket down, queued TransactionEvent"
        );
        return Ok(synthetic_response());
    }
    super::outbound::call(station, "TransactionEvent", &request, CallOptions::default()).await
}

/// Drain every connector's queue in order, best effort: a failed item is
/// logged and the drain moves on.
pub async fn send_queued_transaction_events(station: &Arc<Station>) {
    for evse_id in station.connector_ids() {
        let queued: Vec<QueuedTransactionEvent> = station
            .with_connector(evse_id, |c| c.transaction_event_queue.drain(..).collect())
            .unwrap_or_default();
        if queued.is_empty() {
            continue;
        }
        info!(
            station_id = station.id(),
            evse_id,
            count = queued.len(),
            "Draining queued TransactionEvents"
        );
        for item in queued {
            let opts = CallOptions {
                skip_buffering_on_error: true,
                ..Default::default()
            };
            let result: Result<TransactionEventResponse, OcppError> =
                super::outbound::call(station, "TransactionEvent", &item.request, opts).await;
            if let Err(e) = result {
                warn!(
                    station_id = station.id(),
                    evse_id,
                    seq_no = item.seq_no,
                    error = %e,
                    "Queued TransactionEvent failed"
                );
            }
        }
    }
}

/// TransactionEvent(Started) for a fresh transaction.
pub async fn send_started(
    station: &Arc<Station>,
    evse_id: u32,
    ctx: &TriggerContext,
    id_token: Option<IdTokenType>,
    remote_start_id: Option<i32>,
) -> Result<TransactionEventResponse, OcppError> {
    let opts = EventOptions {
        id_token,
        charging_state: Some(ChargingStateEnumType::Charging),
        remote_start_id,
        ..Default::default()
    };
    let request = build_event(station, evse_id, TransactionEventEnumType::Started, ctx, opts)?;
    send_or_queue(station, evse_id, request).await
}

/// Periodic TransactionEvent(Updated) with the current register sample.
pub async fn send_periodic_update(
    station: &Arc<Station>,
    evse_id: u32,
) -> Result<TransactionEventResponse, OcppError> {
    let register = station
        .read_connector(evse_id, |c| c.energy_active_import_register)
        .unwrap_or(0.0);
    let opts = EventOptions {
        meter_value: Some(vec![register_sample(
            register,
            ReadingContextEnumType::SamplePeriodic,
        )]),
        charging_state: Some(ChargingStateEnumType::Charging),
        ..Default::default()
    };
    let ctx = TriggerContext::meter(trigger_reason::MeterValueKind::Periodic);
    let request = build_event(station, evse_id, TransactionEventEnumType::Updated, &ctx, opts)?;
    send_or_queue(station, evse_id, request).await
}

/// The trigger context a transaction teardown should report.
pub fn context_for_stop(reason: StopReason) -> TriggerContext {
    match reason {
        StopReason::Remote => TriggerContext::remote(RemoteCommand::RequestStop),
        StopReason::HardReset | StopReason::SoftReset | StopReason::ImmediateReset
        | StopReason::Reboot => TriggerContext::remote(RemoteCommand::Reset),
        StopReason::UnlockCommand => TriggerContext::remote(RemoteCommand::UnlockConnector),
        StopReason::EvDisconnected => TriggerContext::cable(CableAction::Unplugged),
        StopReason::Local => TriggerContext {
            local_authorization: Some(LocalAuthorization::StopAuthorized),
            ..Default::default()
        },
        StopReason::Other => TriggerContext {
            charging_state_changed: true,
            ..Default::default()
        },
    }
}

fn wire_reason(reason: StopReason) -> ReasonEnumType {
    match reason {
        StopReason::EvDisconnected => ReasonEnumType::EVDisconnected,
        StopReason::HardReset | StopReason::ImmediateReset => ReasonEnumType::ImmediateReset,
        StopReason::SoftReset | StopReason::Reboot => ReasonEnumType::Reboot,
        StopReason::Local => ReasonEnumType::Local,
        StopReason::Remote => ReasonEnumType::Remote,
        StopReason::UnlockCommand | StopReason::Other => ReasonEnumType::Other,
    }
}

/// TransactionEvent(Ended) plus the connector teardown that follows it.
pub async fn send_ended(
    station: &Arc<Station>,
    evse_id: u32,
    reason: StopReason,
    ctx: TriggerContext,
) -> Result<TransactionEventResponse, OcppError> {
    let register = station
        .read_connector(evse_id, |c| c.energy_active_import_register)
        .unwrap_or(0.0);
    let opts = EventOptions {
        meter_value: Some(vec![register_sample(
            register,
            ReadingContextEnumType::TransactionEnd,
        )]),
        charging_state: Some(ChargingStateEnumType::Idle),
        stopped_reason: Some(wire_reason(reason)),
        ..Default::default()
    };
    let request = build_event(station, evse_id, TransactionEventEnumType::Ended, &ctx, opts)?;
    let response = send_or_queue(station, evse_id, request).await?;

    station.tasks().stop_meter_values(evse_id);
    let _ = status_notification::update_and_notify(
        station,
        evse_id,
        ConnectorStatusEnumType::Available,
    )
    .await;
    station.decrement_power_divider();
    station.with_connector(evse_id, |c| c.clear_transaction());

    info!(station_id = station.id(), evse_id, ?reason, "Transaction ended");
    Ok(response)
}

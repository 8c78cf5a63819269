//! MeterValues builders and senders.
//!
//! Samples report the lifetime Energy.Active.Import.Register in Wh, the
//! only measurand the simulated meter keeps.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::types::{MeterValue, Measurand, ReadingContext, SampledValue, UnitOfMeasure};

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub(crate) fn register_sample(register_wh: f64, context: ReadingContext) -> MeterValue {
    MeterValue {
        timestamp: Utc::now(),
        sampled_value: vec![SampledValue {
            value: format!("{:.0}", register_wh),
            context: Some(context),
            format: None,
            measurand: Some(Measurand::EnergyActiveImportRegister),
            phase: None,
            location: None,
            unit: Some(UnitOfMeasure::Wh),
        }],
    }
}

async fn send_sample(
    station: &Arc<Station>,
    connector_id: u32,
    context: ReadingContext,
    triggered: bool,
) -> Result<(), OcppError> {
    let Some((register, transaction_id)) = station.read_connector(connector_id, |c| {
        (
            c.energy_active_import_register,
            c.transaction_id.as_ref().and_then(|id| id.as_integer()),
        )
    }) else {
        return Ok(());
    };

    let request = MeterValuesRequest {
        connector_id,
        transaction_id,
        meter_value: vec![register_sample(register, context)],
    };
    let opts = CallOptions {
        triggered,
        ..Default::default()
    };
    let _: MeterValuesResponse = super::call(station, "MeterValues", &request, opts).await?;
    Ok(())
}

/// Periodic sample while a transaction runs.
pub async fn send_periodic(station: &Arc<Station>, connector_id: u32) -> Result<(), OcppError> {
    send_sample(station, connector_id, ReadingContext::SamplePeriodic, false).await
}

/// First sample of a fresh transaction.
pub async fn send_transaction_begin(
    station: &Arc<Station>,
    connector_id: u32,
) -> Result<(), OcppError> {
    send_sample(station, connector_id, ReadingContext::TransactionBegin, false).await
}

/// Final sample after StopTransaction (out-of-order variant).
pub async fn send_transaction_end(
    station: &Arc<Station>,
    connector_id: u32,
) -> Result<(), OcppError> {
    send_sample(station, connector_id, ReadingContext::TransactionEnd, false).await
}

/// TriggerMessage(MeterValues) re-emission.
pub async fn send_triggered(station: &Arc<Station>, connector_id: u32) -> Result<(), OcppError> {
    send_sample(station, connector_id, ReadingContext::Trigger, true).await
}

//! NotifyReport emission for accepted GetBaseReport requests.
//!
//! Reports are fragmented into chunks of at most 100 items; `seqNo` counts
//! from 0 and `tbc` is true on every chunk but the last. Even an empty
//! report produces one NotifyReport (with `reportData` omitted). The cache
//! entry is dropped once the sequence went out.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v2_0_1::datatypes::report_data_type::ReportDataType;
use rust_ocpp::v2_0_1::messages::notify_report::{NotifyReportRequest, NotifyReportResponse};
use tracing::{info, warn};

use crate::router::CallOptions;
use crate::station::Station;
use crate::support::errors::OcppError;

pub const MAX_ITEMS_PER_MESSAGE: usize = 100;

/// Emit the NotifyReport sequence for every cached report.
pub async fn flush_pending(station: &Arc<Station>) {
    let request_ids: Vec<i32> = station.report_cache().iter().map(|e| *e.key()).collect();
    for request_id in request_ids {
        flush_one(station, request_id).await;
    }
}

async fn flush_one(station: &Arc<Station>, request_id: i32) {
    let Some((_, report)) = station.report_cache().remove(&request_id) else {
        return;
    };
    let generated_at = Utc::now();

    let chunks: Vec<Vec<ReportDataType>> = if report.is_empty() {
        vec![Vec::new()]
    } else {
        report
            .chunks(MAX_ITEMS_PER_MESSAGE)
            .map(|c| c.to_vec())
            .collect()
    };
    let total = chunks.len();

    for (index, chunk) in chunks.into_iter().enumerate() {
        let request = NotifyReportRequest {
            request_id,
            generated_at,
            seq_no: index as i32,
            tbc: Some(index + 1 < total),
            report_data: if chunk.is_empty() { None } else { Some(chunk) },
        };
        let result: Result<NotifyReportResponse, OcppError> = super::call(
            station,
            "NotifyReport",
            &request,
            CallOptions::default(),
        )
        .await;
        if let Err(e) = result {
            warn!(
                station_id = station.id(),
                request_id,
                seq_no = index,
                error = %e,
                "NotifyReport failed"
            );
        }
    }
    info!(
        station_id = station.id(),
        request_id, chunks = total, "Report delivered"
    );
}

//! UpdateFirmware simulation.
//!
//! Drives the 1.6 firmware status machine on a timer: wait for the
//! retrieve date, take idle connectors out of service, walk through
//! Downloading → Downloaded → Installing, then either reset the station or
//! report Installed. The configured failure step short-circuits the walk.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_ocpp::v1_6::types::{ChargePointStatus, FirmwareStatus};
use tracing::{debug, info};

use crate::config::FirmwareFailure;
use crate::station::Station;
use crate::v16::outbound::{notifications, status_notification};

/// Poll period while waiting for running transactions to finish.
const TRANSACTION_WAIT: Duration = Duration::from_secs(15);

/// Spawn the simulation as a fire-and-forget job bound to the station.
pub fn schedule_simulation(station: &Arc<Station>, retrieve_date: DateTime<Utc>) {
    let worker = station.clone();
    let job = tokio::spawn(async move {
        run(worker, retrieve_date).await;
    });
    station.tasks().push_background(job);
}

async fn run(station: Arc<Station>, retrieve_date: DateTime<Utc>) {
    let wait = (retrieve_date - Utc::now()).num_seconds();
    if wait > 0 {
        tokio::time::sleep(Duration::from_secs(wait as u64)).await;
    }

    let upgrade = station.config().firmware_upgrade.clone();

    // Idle connectors go out of service before the download starts.
    for connector_id in station.connector_ids() {
        let busy = station
            .read_connector(connector_id, |c| c.has_active_transaction())
            .unwrap_or(false);
        if !busy {
            let _ = status_notification::update_and_notify(
                &station,
                connector_id,
                ChargePointStatus::Unavailable,
            )
            .await;
        }
    }

    let _ = notifications::send_firmware_status(&station, FirmwareStatus::Downloading, false).await;
    if upgrade.failure_status == Some(FirmwareFailure::DownloadFailed) {
        sleep_random(&upgrade.min_delay_secs, &upgrade.max_delay_secs).await;
        let _ =
            notifications::send_firmware_status(&station, FirmwareStatus::DownloadFailed, false)
                .await;
        info!(station_id = station.id(), "Simulated firmware download failure");
        return;
    }

    sleep_random(&upgrade.min_delay_secs, &upgrade.max_delay_secs).await;
    let _ = notifications::send_firmware_status(&station, FirmwareStatus::Downloaded, false).await;

    // Installation waits for every transaction to end.
    let mut waited_for_transactions = false;
    while station.active_transaction_count() > 0 {
        waited_for_transactions = true;
        debug!(
            station_id = station.id(),
            "Transactions still running, delaying firmware installation"
        );
        tokio::time::sleep(TRANSACTION_WAIT).await;
    }
    for connector_id in station.connector_ids() {
        let _ = status_notification::update_and_notify(
            &station,
            connector_id,
            ChargePointStatus::Unavailable,
        )
        .await;
    }
    if !waited_for_transactions {
        sleep_random(&upgrade.min_delay_secs, &upgrade.max_delay_secs).await;
    }

    let _ = notifications::send_firmware_status(&station, FirmwareStatus::Installing, false).await;
    if upgrade.failure_status == Some(FirmwareFailure::InstallationFailed) {
        sleep_random(&upgrade.min_delay_secs, &upgrade.max_delay_secs).await;
        let _ = notifications::send_firmware_status(
            &station,
            FirmwareStatus::InstallationFailed,
            false,
        )
        .await;
        info!(station_id = station.id(), "Simulated firmware installation failure");
        return;
    }

    sleep_random(&upgrade.min_delay_secs, &upgrade.max_delay_secs).await;
    if upgrade.reset {
        station.set_firmware_status(Some(FirmwareStatus::Installed));
        station.reboot("Reboot").await;
    } else {
        let _ =
            notifications::send_firmware_status(&station, FirmwareStatus::Installed, false).await;
    }
}

async fn sleep_random(min_secs: &u64, max_secs: &u64) {
    let (low, high) = if min_secs <= max_secs {
        (*min_secs, *max_secs)
    } else {
        (*max_secs, *min_secs)
    };
    let secs = rand::thread_rng().gen_range(low..=high);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

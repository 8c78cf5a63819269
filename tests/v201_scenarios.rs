//! End-to-end OCPP 2.0.1 flows driven through the in-memory transport.

mod common;

use serde_json::json;

use common::Csms;
use ocpp_simulator::domain::registration::RegistrationState;
use ocpp_simulator::v201::transaction_event;
use ocpp_simulator::{OcppVersion, StationConfig};

fn base_config() -> StationConfig {
    let mut config = StationConfig::new("CS-201", "SimVendor", "SimModel", OcppVersion::V201);
    config.connector_count = 1;
    config.serial_number = Some("SN-0001".to_string());
    config.firmware_version = Some("1.2.3".to_string());
    config.local_auth_list = vec!["TAG-1".to_string()];
    config
}

fn accepted(config: StationConfig) -> Csms {
    let csms = Csms::start(config);
    csms.station.set_registration(RegistrationState::Accepted);
    csms
}

#[tokio::test]
async fn boot_accepts_and_tracks_interval() {
    let mut csms = Csms::start(base_config());

    let station = csms.station.clone();
    tokio::spawn(async move { station.on_connected().await });

    let (id, payload) = csms.expect_call("BootNotification").await;
    assert_eq!(payload["chargingStation"]["vendorName"], "SimVendor");
    assert_eq!(payload["chargingStation"]["model"], "SimModel");
    assert_eq!(payload["reason"], "PowerUp");

    csms.reply(
        &id,
        json!({"status": "Accepted", "interval": 300, "currentTime": "2024-01-01T00:00:00Z"}),
    )
    .await;

    // Wait for the response handler to run.
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while !csms.station.is_registered() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registration accepted");
    assert!(csms.station.tasks().heartbeat_running());
}

#[tokio::test]
async fn get_base_report_full_inventory_fragments_into_notify_reports() {
    let mut csms = accepted(base_config());

    csms.send_call(
        "m-gbr",
        "GetBaseReport",
        json!({"requestId": 7, "reportBase": "FullInventory"}),
    )
    .await;
    assert_eq!(csms.expect_result("m-gbr").await["status"], "Accepted");

    let mut total_items = 0usize;
    let mut expected_seq = 0i64;
    loop {
        let (id, payload) = csms.expect_call("NotifyReport").await;
        assert_eq!(payload["requestId"], 7);
        assert_eq!(payload["seqNo"], expected_seq);
        let items = payload["reportData"].as_array().map(|a| a.len()).unwrap_or(0);
        assert!(items <= 100);
        total_items += items;
        csms.reply(&id, json!({})).await;
        if !payload["tbc"].as_bool().unwrap_or(false) {
            break;
        }
        expected_seq += 1;
    }

    // Identity (model, vendor, serial, firmware) + every visible OCPP key
    // + per-EVSE availability, at minimum.
    let config_keys = csms.station.configuration().visible().len();
    assert!(total_items >= 4 + config_keys + 1);
    assert!(csms.station.report_cache().is_empty());
}

#[tokio::test]
async fn unknown_report_base_is_not_supported() {
    let mut csms = accepted(base_config());
    csms.send_call(
        "m-gbr",
        "GetBaseReport",
        json!({"requestId": 8, "reportBase": "Wishlist"}),
    )
    .await;
    assert_eq!(csms.expect_result("m-gbr").await["status"], "NotSupported");
    csms.assert_never_sent("NotifyReport");
}

#[tokio::test]
async fn set_then_get_variable_round_trips_over_the_wire() {
    let mut csms = accepted(base_config());

    csms.send_call(
        "m-set",
        "SetVariables",
        json!({"setVariableData": [{
            "attributeValue": "42",
            "component": {"name": "SampledDataCtrlr"},
            "variable": {"name": "TxUpdatedInterval"}
        }]}),
    )
    .await;
    let result = csms.expect_result("m-set").await;
    assert_eq!(result["setVariableResult"][0]["attributeStatus"], "Accepted");

    csms.send_call(
        "m-get",
        "GetVariables",
        json!({"getVariableData": [{
            "component": {"name": "SampledDataCtrlr"},
            "variable": {"name": "TxUpdatedInterval"}
        }]}),
    )
    .await;
    let result = csms.expect_result("m-get").await;
    assert_eq!(result["getVariableResult"][0]["attributeStatus"], "Accepted");
    assert_eq!(result["getVariableResult"][0]["attributeValue"], "42");
}

#[tokio::test]
async fn remote_start_emits_transaction_event_with_first_only_fields() {
    let mut csms = accepted(base_config());

    csms.send_call(
        "m-start",
        "RequestStartTransaction",
        json!({
            "evseId": 1,
            "remoteStartId": 99,
            "idToken": {"idToken": "TAG-1", "type": "ISO14443"}
        }),
    )
    .await;

    let (id, payload) = csms.expect_call("StatusNotification").await;
    assert_eq!(payload["connectorStatus"], "Occupied");
    assert_eq!(payload["evseId"], 1);
    csms.reply(&id, json!({})).await;

    let (id, payload) = csms.expect_call("TransactionEvent").await;
    assert_eq!(payload["eventType"], "Started");
    assert_eq!(payload["triggerReason"], "RemoteStart");
    assert_eq!(payload["seqNo"], 0);
    assert_eq!(payload["evse"]["id"], 1);
    assert_eq!(payload["idToken"]["idToken"], "TAG-1");
    assert_eq!(payload["transactionInfo"]["remoteStartId"], 99);
    let tx_id = payload["transactionInfo"]["transactionId"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!tx_id.is_empty() && tx_id.len() <= 36);
    csms.reply(&id, json!({})).await;

    let result = csms.expect_result("m-start").await;
    assert_eq!(result["status"], "Accepted");
    assert_eq!(result["transactionId"], tx_id.as_str());

    // Stop it remotely: seqNo increments, evse and idToken appear no more.
    csms.send_call(
        "m-stop",
        "RequestStopTransaction",
        json!({"transactionId": tx_id}),
    )
    .await;

    let (id, payload) = csms.expect_call("TransactionEvent").await;
    assert_eq!(payload["eventType"], "Ended");
    assert_eq!(payload["triggerReason"], "RemoteStop");
    assert_eq!(payload["seqNo"], 1);
    assert!(payload.get("evse").is_none() || payload["evse"].is_null());
    assert!(payload.get("idToken").is_none() || payload["idToken"].is_null());
    assert_eq!(payload["transactionInfo"]["stoppedReason"], "Remote");
    csms.reply(&id, json!({})).await;

    let (id, payload) = csms.expect_call("StatusNotification").await;
    assert_eq!(payload["connectorStatus"], "Available");
    csms.reply(&id, json!({})).await;

    assert_eq!(csms.expect_result("m-stop").await["status"], "Accepted");
    csms.station
        .read_connector(1, |c| assert!(!c.transaction_started))
        .unwrap();
}

#[tokio::test]
async fn remote_start_with_unknown_token_is_rejected() {
    let mut csms = accepted(base_config());

    csms.send_call(
        "m-start",
        "RequestStartTransaction",
        json!({
            "evseId": 1,
            "remoteStartId": 1,
            "idToken": {"idToken": "TAG-X", "type": "ISO14443"}
        }),
    )
    .await;
    assert_eq!(csms.expect_result("m-start").await["status"], "Rejected");
    csms.assert_never_sent("TransactionEvent");
}

#[tokio::test]
async fn pending_station_answers_configuration_but_not_remote_start() {
    let mut csms = Csms::start(base_config());
    csms.station.set_registration(RegistrationState::Pending);

    csms.send_call(
        "m-get",
        "GetVariables",
        json!({"getVariableData": [{
            "component": {"name": "OCPPCommCtrlr"},
            "variable": {"name": "HeartbeatInterval"}
        }]}),
    )
    .await;
    let result = csms.expect_result("m-get").await;
    assert_eq!(result["getVariableResult"][0]["attributeStatus"], "Accepted");

    csms.send_call(
        "m-start",
        "RequestStartTransaction",
        json!({
            "evseId": 1,
            "remoteStartId": 1,
            "idToken": {"idToken": "TAG-1", "type": "ISO14443"}
        }),
    )
    .await;
    let (code, _) = csms.expect_error("m-start").await;
    assert_eq!(code, "SecurityError");
}

#[tokio::test]
async fn reset_with_unknown_evse_is_rejected() {
    let mut csms = accepted(base_config());
    csms.send_call("m-reset", "Reset", json!({"type": "Immediate", "evseId": 42}))
        .await;
    let result = csms.expect_result("m-reset").await;
    assert_eq!(result["status"], "Rejected");
    assert_eq!(result["statusInfo"]["reasonCode"], "UnknownEvse");
}

#[tokio::test]
async fn offline_transaction_events_queue_and_drain_in_order() {
    let mut csms = accepted(base_config());

    // Start a transaction while online.
    csms.send_call(
        "m-start",
        "RequestStartTransaction",
        json!({
            "evseId": 1,
            "remoteStartId": 5,
            "idToken": {"idToken": "TAG-1", "type": "ISO14443"}
        }),
    )
    .await;
    let (id, _) = csms.expect_call("StatusNotification").await;
    csms.reply(&id, json!({})).await;
    let (id, _) = csms.expect_call("TransactionEvent").await;
    csms.reply(&id, json!({})).await;
    csms.expect_result("m-start").await;

    // Drop the socket and produce two periodic updates.
    csms.transport.set_open(false);
    transaction_event::send_periodic_update(&csms.station, 1)
        .await
        .expect("synthetic response while offline");
    transaction_event::send_periodic_update(&csms.station, 1)
        .await
        .expect("synthetic response while offline");

    let queued = csms
        .station
        .read_connector(1, |c| c.transaction_event_queue.len())
        .unwrap();
    assert_eq!(queued, 2);
    csms.assert_never_sent("MeterValues");

    // Reconnect and drain; the first item is answered with an error, the
    // second must still be attempted.
    csms.transport.set_open(true);
    let drainer = csms.station.clone();
    let drain = tokio::spawn(async move {
        transaction_event::send_queued_transaction_events(&drainer).await;
    });

    let (id, payload) = csms.expect_call("TransactionEvent").await;
    assert_eq!(payload["seqNo"], 1);
    assert_eq!(payload["offline"], true);
    assert_eq!(payload["triggerReason"], "MeterValuePeriodic");
    csms.reply_error(&id, "InternalError", "transient").await;

    let (id, payload) = csms.expect_call("TransactionEvent").await;
    assert_eq!(payload["seqNo"], 2);
    csms.reply(&id, json!({})).await;

    drain.await.unwrap();
    let queued = csms
        .station
        .read_connector(1, |c| c.transaction_event_queue.len())
        .unwrap();
    assert_eq!(queued, 0);
}

#[tokio::test]
async fn malformed_payload_is_a_formation_violation() {
    let mut csms = accepted(base_config());
    csms.send_call("m-bad", "SetVariables", json!({"setVariableData": "nope"}))
        .await;
    let (code, _) = csms.expect_error("m-bad").await;
    assert_eq!(code, "FormationViolation");
}

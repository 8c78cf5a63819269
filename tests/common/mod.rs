//! In-memory CSMS stub driving a station frame by frame.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use ocpp_simulator::{InMemoryTransport, Station, StationConfig};

const POLL: Duration = Duration::from_millis(5);
const WAIT: Duration = Duration::from_secs(5);

pub struct Csms {
    pub station: Arc<Station>,
    pub transport: Arc<InMemoryTransport>,
    cursor: usize,
}

impl Csms {
    pub fn start(config: StationConfig) -> Self {
        ocpp_simulator::support::logging::init();
        let transport = Arc::new(InMemoryTransport::new());
        let station = Station::new(config, transport.clone()).shared();
        Self::with_station(station, transport)
    }

    /// Wrap a station that was built with extra collaborators attached.
    pub fn with_station(station: Arc<Station>, transport: Arc<InMemoryTransport>) -> Self {
        Self {
            station,
            transport,
            cursor: 0,
        }
    }

    /// Deliver a CSMS-initiated CALL to the station.
    pub async fn send_call(&self, message_id: &str, action: &str, payload: Value) {
        let frame = json!([2, message_id, action, payload]).to_string();
        self.station.on_frame(&frame).await;
    }

    /// Answer a station-initiated CALL.
    pub async fn reply(&self, message_id: &str, payload: Value) {
        let frame = json!([3, message_id, payload]).to_string();
        self.station.on_frame(&frame).await;
    }

    pub async fn reply_error(&self, message_id: &str, code: &str, description: &str) {
        let frame = json!([4, message_id, code, description, {}]).to_string();
        self.station.on_frame(&frame).await;
    }

    async fn next_frame_matching(
        &mut self,
        describe: &str,
        matcher: impl Fn(&Value) -> bool,
    ) -> Value {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let frames = self.transport.sent_frames();
            for (index, frame) in frames.iter().enumerate().skip(self.cursor) {
                let value: Value = serde_json::from_str(frame).expect("frame is JSON");
                if matcher(&value) {
                    self.cursor = index + 1;
                    return value;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {describe}; frames: {frames:#?}");
            }
            tokio::time::sleep(POLL).await;
        }
    }

    /// Wait for the next station-initiated CALL with the given action.
    /// Returns (messageId, payload).
    pub async fn expect_call(&mut self, action: &str) -> (String, Value) {
        let frame = self
            .next_frame_matching(&format!("CALL {action}"), |v| {
                v[0] == 2 && v[2] == action
            })
            .await;
        (frame[1].as_str().unwrap().to_string(), frame[3].clone())
    }

    /// Wait for the CALLRESULT answering `message_id`.
    pub async fn expect_result(&mut self, message_id: &str) -> Value {
        let frame = self
            .next_frame_matching(&format!("CALLRESULT {message_id}"), |v| {
                v[0] == 3 && v[1] == message_id
            })
            .await;
        frame[2].clone()
    }

    /// Wait for the CALLERROR answering `message_id`. Returns (code, description).
    pub async fn expect_error(&mut self, message_id: &str) -> (String, String) {
        let frame = self
            .next_frame_matching(&format!("CALLERROR {message_id}"), |v| {
                v[0] == 4 && v[1] == message_id
            })
            .await;
        (
            frame[2].as_str().unwrap().to_string(),
            frame[3].as_str().unwrap_or_default().to_string(),
        )
    }

    /// Assert that no frame with the given action was sent so far.
    pub fn assert_never_sent(&self, action: &str) {
        for frame in self.transport.sent_frames() {
            let value: Value = serde_json::from_str(&frame).expect("frame is JSON");
            assert!(
                !(value[0] == 2 && value[2] == action),
                "unexpected {action} frame: {frame}"
            );
        }
    }
}

use std::cell::Cell;
use std::convert::Infallible;
use std::thread;
use std::time::{Duration, Instant};

use ed25519_dalek::SigningKey;
use smartlock_device::keystore::PRIVATE_KEY_LABEL;
use smartlock_device::{
    Engine, EngineConfig, EngineEvent, IssuerResponse, KeyIssuer, KeyMaterial, MemoryStorage,
    TaskReport, UnavailableReason, UuidSource, VerificationOutcome,
};
use smartlock_mcu::{ActuationSink, Banner, LockState, Notifier, TransportEvents};
use smartlock_proto::codec;
use smartlock_proto::command::{lock_request, pem_envelope, unlock_request};

const SEED: [u8; 32] = [42u8; 32];

#[derive(Debug, Clone, PartialEq)]
enum SinkCall {
    State(LockState),
    Banner(Banner),
    Clear,
}

#[derive(Default)]
struct RecordingSink {
    calls: Vec<SinkCall>,
}

impl ActuationSink for RecordingSink {
    fn set_state(&mut self, state: LockState) {
        self.calls.push(SinkCall::State(state));
    }

    fn show_banner(&mut self, banner: Banner) {
        self.calls.push(SinkCall::Banner(banner));
    }

    fn clear_banner(&mut self) {
        self.calls.push(SinkCall::Clear);
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Vec<String>,
}

impl Notifier for RecordingNotifier {
    type Error = Infallible;

    fn notify(&mut self, text: &str) -> Result<(), Self::Error> {
        self.sent.push(text.to_string());
        Ok(())
    }
}

struct StubIssuer {
    status: u16,
    body: String,
    requests: Cell<usize>,
}

impl StubIssuer {
    fn new(status: u16, body: String) -> Self {
        Self {
            status,
            body,
            requests: Cell::new(0),
        }
    }

    fn serving(seed: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        let body = serde_json::json!({
            "private_key": codec::armor(PRIVATE_KEY_LABEL, &signing.to_keypair_bytes()),
            "public_key": public_key(seed),
            "room_number": "101",
        });
        Self::new(200, body.to_string())
    }
}

impl KeyIssuer for StubIssuer {
    type Error = Infallible;

    fn get(&self, _url: &str, _timeout: Duration) -> Result<IssuerResponse, Infallible> {
        self.requests.set(self.requests.get() + 1);
        Ok(IssuerResponse {
            status: self.status,
            body: self.body.clone().into_bytes(),
        })
    }
}

type TestEngine = Engine<MemoryStorage, StubIssuer, RecordingSink, RecordingNotifier>;

fn public_key(seed: &[u8; 32]) -> String {
    codec::encode(&SigningKey::from_bytes(seed).verifying_key().to_bytes())
}

fn engine(issuer: StubIssuer) -> TestEngine {
    Engine::new(
        EngineConfig::default(),
        MemoryStorage::new(),
        issuer,
        RecordingSink::default(),
        RecordingNotifier::default(),
    )
}

/// Connect and run the provisioning task
fn connected(issuer: StubIssuer, now: Instant) -> TestEngine {
    let mut engine = engine(issuer);
    engine.handle().on_connect();
    let outcome = engine.poll_at(now);
    assert_eq!(outcome.events, vec![EngineEvent::Connected]);
    engine
}

fn notifications(engine: &TestEngine) -> Vec<&str> {
    engine
        .notifier()
        .sent
        .iter()
        .map(String::as_str)
        .filter(|t| !t.starts_with("ping"))
        .collect()
}

#[test]
fn connect_provisions_key() {
    let now = Instant::now();
    let mut engine = engine(StubIssuer::serving(&SEED));
    engine.handle().on_connect();
    assert!(engine.handle().is_connected());

    let outcome = engine.poll_at(now);
    assert_eq!(
        outcome.task,
        Some(TaskReport::KeyProvisioned {
            room: "101".to_string()
        })
    );
    assert!(engine.key_store().has_key());
    assert_eq!(notifications(&engine), ["key provisioned"]);
    assert_eq!(engine.notifier().sent.first().map(String::as_str), Some("key provisioned"));
}

#[test]
fn valid_unlock_in_two_chunks() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);
    let handle = engine.handle();

    let request = unlock_request(&public_key(&SEED));
    let (head, tail) = request.split_at(request.len() / 2);
    handle.on_write(head.as_bytes());
    assert_eq!(handle.pending_tasks(), 0);
    handle.on_write(tail.as_bytes());
    assert_eq!(handle.pending_tasks(), 1);

    let outcome = engine.poll_at(now);
    assert_eq!(outcome.task, Some(TaskReport::Verified(VerificationOutcome::Valid)));
    assert_eq!(engine.lock_state(), LockState::Unlocked);
    assert!(engine.sink().calls.contains(&SinkCall::State(LockState::Unlocked)));
    assert!(engine.sink().calls.contains(&SinkCall::Banner(Banner::Unlocked)));
    assert_eq!(notifications(&engine), ["key provisioned", "unlocked"]);
}

#[test]
fn legacy_unlock_split_across_writes_is_refused() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);
    let handle = engine.handle();

    handle.on_write(b"unl");
    handle.on_write(b"ock\n");
    assert_eq!(handle.pending_tasks(), 0);
    assert_eq!(engine.poll_at(now).task, None);
    assert_eq!(engine.lock_state(), LockState::Locked);
}

#[test]
fn pem_envelope_unlocks_like_json() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);

    // No trailing newline or brace: the NUL ends the message
    let mut envelope = pem_envelope(&public_key(&SEED)).replace('\n', " ");
    envelope.push('\0');
    engine.handle().on_write(envelope.as_bytes());

    let outcome = engine.poll_at(now);
    assert_eq!(outcome.task, Some(TaskReport::Verified(VerificationOutcome::Valid)));
    assert_eq!(engine.lock_state(), LockState::Unlocked);
}

#[test]
fn wrong_key_stays_locked() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);

    engine
        .handle()
        .on_write(unlock_request(&public_key(&[1u8; 32])).as_bytes());
    let outcome = engine.poll_at(now);

    assert_eq!(outcome.task, Some(TaskReport::Verified(VerificationOutcome::Invalid)));
    assert_eq!(engine.lock_state(), LockState::Locked);
    assert!(!engine.sink().calls.contains(&SinkCall::State(LockState::Unlocked)));
    assert!(engine.sink().calls.contains(&SinkCall::Banner(Banner::AuthFailed)));
    assert_eq!(notifications(&engine), ["key provisioned", "auth failed"]);
}

#[test]
fn unlock_without_key_material_is_unavailable() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::new(503, String::new()), now);
    assert_eq!(notifications(&engine), ["key provisioning failed"]);

    engine
        .handle()
        .on_write(unlock_request(&public_key(&SEED)).as_bytes());
    let outcome = engine.poll_at(now);

    assert_eq!(
        outcome.task,
        Some(TaskReport::Verified(VerificationOutcome::Unavailable(
            UnavailableReason::NoKey
        )))
    );
    assert_eq!(engine.lock_state(), LockState::Locked);
}

#[test]
fn unlock_without_public_key_schedules_nothing() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);
    let sink_calls = engine.sink().calls.len();

    engine.handle().on_write(br#"{"command":"unlock"}"#);
    assert_eq!(engine.handle().pending_tasks(), 0);
    assert_eq!(engine.poll_at(now).task, None);
    assert_eq!(engine.sink().calls.len(), sink_calls);
}

#[test]
fn legacy_lock_actuates_without_auth() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::new(500, String::new()), now);

    engine.handle().on_write(b"lock\n");
    assert_eq!(engine.poll_at(now).task, Some(TaskReport::Locked));
    assert!(engine.sink().calls.contains(&SinkCall::Banner(Banner::Locked)));
    assert_eq!(notifications(&engine), ["key provisioning failed", "locked"]);
}

#[test]
fn server_error_keeps_previous_material() {
    let now = Instant::now();
    let mut engine = engine(StubIssuer::new(500, r#"{"private_key":"AAAA"}"#.to_string()));
    let previous = KeyMaterial::new(&codec::encode(&SEED), None, "101");
    engine.key_store_mut().save(&previous).unwrap();

    engine.handle().on_connect();
    let outcome = engine.poll_at(now);

    assert!(matches!(outcome.task, Some(TaskReport::ProvisioningFailed(_))));
    assert_eq!(engine.key_store().load().unwrap(), Some(previous));
}

#[test]
fn one_task_per_poll_and_latest_unlock_wins() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);
    let handle = engine.handle();

    handle.on_write(unlock_request("WRONG=").as_bytes());
    handle.on_write(lock_request().as_bytes());
    handle.on_write(unlock_request(&public_key(&SEED)).as_bytes());
    assert_eq!(handle.pending_tasks(), 2);

    assert_eq!(engine.poll_at(now).task, Some(TaskReport::Locked));
    assert_eq!(
        engine.poll_at(now).task,
        Some(TaskReport::Verified(VerificationOutcome::Valid))
    );
    assert_eq!(engine.poll_at(now).task, None);
    assert_eq!(engine.lock_state(), LockState::Unlocked);
}

#[test]
fn final_state_follows_last_message() {
    let now = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), now);
    let handle = engine.handle();

    handle.on_write(lock_request().as_bytes());
    handle.on_write(unlock_request(&public_key(&SEED)).as_bytes());
    handle.on_write(lock_request().as_bytes());

    let mut reports = Vec::new();
    while let Some(report) = engine.poll_at(now).task {
        reports.push(report);
    }

    assert_eq!(
        reports,
        [
            TaskReport::Verified(VerificationOutcome::Valid),
            TaskReport::Locked
        ]
    );
    assert_eq!(engine.lock_state(), LockState::Locked);
    assert_eq!(notifications(&engine), ["key provisioned", "unlocked", "locked"]);
}

#[test]
fn writes_from_another_thread_while_polling() {
    const MESSAGES: usize = 40;
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut engine = connected(StubIssuer::serving(&SEED), Instant::now());
    let handle = engine.handle();
    let valid = unlock_request(&public_key(&SEED));

    let writer = thread::spawn(move || {
        for i in 0..MESSAGES {
            let message = if i % 2 == 0 { valid.clone() } else { lock_request() };
            for chunk in message.as_bytes().chunks(7) {
                handle.on_write(chunk);
                thread::yield_now();
            }
            // the next message waits until this one has been drained
            while handle.pending_tasks() > 0 && Instant::now() < deadline {
                thread::yield_now();
            }
        }
    });

    let mut reports = Vec::new();
    while reports.len() < MESSAGES && Instant::now() < deadline {
        if let Some(report) = engine.poll().task {
            reports.push(report);
        }
    }
    writer.join().unwrap();

    let expected: Vec<TaskReport> = (0..MESSAGES)
        .map(|i| {
            if i % 2 == 0 {
                TaskReport::Verified(VerificationOutcome::Valid)
            } else {
                TaskReport::Locked
            }
        })
        .collect();
    assert_eq!(reports, expected);
    assert_eq!(engine.handle().pending_tasks(), 0);
    assert_eq!(engine.lock_state(), LockState::Locked);
}

#[test]
fn banner_clears_after_deadline() {
    let start = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), start);

    engine.handle().on_write(b"lock\n");
    engine.poll_at(start);
    assert_ne!(engine.sink().calls.last(), Some(&SinkCall::Clear));

    engine.poll_at(start + Duration::from_millis(1999));
    assert!(!engine.sink().calls.contains(&SinkCall::Clear));

    engine.poll_at(start + Duration::from_millis(2000));
    assert_eq!(engine.sink().calls.last(), Some(&SinkCall::Clear));
}

#[test]
fn pings_while_connected() {
    let start = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), start);
    engine.poll_at(start + Duration::from_millis(1000));
    engine.poll_at(start + Duration::from_millis(2000));

    let pings: Vec<_> = engine
        .notifier()
        .sent
        .iter()
        .filter(|t| t.starts_with("ping"))
        .cloned()
        .collect();
    assert_eq!(pings, ["ping 0", "ping 1"]);

    engine.handle().on_disconnect();
    engine.poll_at(start + Duration::from_millis(4000));
    engine.poll_at(start + Duration::from_millis(6000));
    assert!(!engine.notifier().sent.iter().any(|t| t == "ping 2"));
}

#[test]
fn disconnect_resumes_advertising_after_delay() {
    let start = Instant::now();
    let mut engine = connected(StubIssuer::serving(&SEED), start);

    engine.handle().on_write(b"{\"command\":\"lo");
    engine.handle().on_disconnect();
    assert!(!engine.handle().is_connected());

    let outcome = engine.poll_at(start);
    assert_eq!(outcome.events, vec![EngineEvent::Disconnected]);

    let outcome = engine.poll_at(start + Duration::from_millis(499));
    assert!(outcome.events.is_empty());

    let outcome = engine.poll_at(start + Duration::from_millis(500));
    assert_eq!(outcome.events, vec![EngineEvent::ResumeAdvertising]);

    // The half message did not survive the disconnect
    engine.handle().on_connect();
    assert_eq!(engine.handle().pending_tasks(), 1);
    engine.handle().on_write(b"ck\"}");
    assert_eq!(engine.handle().pending_tasks(), 1);
}

#[test]
fn notifications_are_dropped_while_disconnected() {
    let now = Instant::now();
    let mut engine = engine(StubIssuer::serving(&SEED));
    engine.handle().on_write(b"lock\n");
    assert_eq!(engine.poll_at(now).task, Some(TaskReport::Locked));
    assert!(engine.notifier().sent.is_empty());
}

#[test]
fn service_uuid_comes_from_issuer() {
    let room_uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
    let body = serde_json::json!({ "ble_uuids": [room_uuid] }).to_string();
    let mut engine = engine(StubIssuer::new(200, body));

    let resolved = engine.resolve_service_uuid();
    assert_eq!(resolved.uuid, room_uuid);
    assert_eq!(resolved.source, UuidSource::Issuer);
    assert_eq!(engine.config().service_uuid, room_uuid);
}

#[test]
fn service_uuid_defaults_to_config_without_issuer() {
    let mut engine = engine(StubIssuer::new(503, String::new()));
    let resolved = engine.resolve_service_uuid();
    assert_eq!(resolved.source, UuidSource::Configured);
    assert_eq!(resolved.uuid, EngineConfig::default().service_uuid);
}

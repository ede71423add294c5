//! The lock protocol engine
//!
//! Two halves share one mutex:
//! - [`EngineHandle`] is given to the BLE adapter and runs in its callback
//!   context. It frames bytes, classifies messages and queues tasks, nothing
//!   else.
//! - [`Engine::poll`] runs on the main loop. It drains at most one task per
//!   call and is the only place that touches the network, storage, the
//!   actuator or the notifier.
//!
//! The mutex is never held across I/O.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use smartlock_mcu::{
    ActuationSink, Banner, BlobStorage, ConnectionState, LockState, Notifier, TransportEvents,
    notifications,
};
use smartlock_proto::{MessageFramer, classify};

use crate::config::EngineConfig;
use crate::keystore::KeyStore;
use crate::provision::{KeyIssuer, ProvisioningClient};
use crate::queue::{PendingTask, TaskQueue};
use crate::service_uuid::ServiceUuid;
use crate::verifier::{Ed25519, KeyDerivation, VerificationOutcome, Verifier};

/// Connection events surfaced to the adapter by the polling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Connected,
    Disconnected,
    /// The disconnect settled; the adapter should advertise again
    ResumeAdvertising,
}

/// What the task drained by a poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskReport {
    KeyProvisioned { room: String },
    ProvisioningFailed(String),
    Verified(VerificationOutcome),
    Locked,
}

/// Result of one polling step
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub events: Vec<EngineEvent>,
    pub task: Option<TaskReport>,
}

struct Shared {
    framer: MessageFramer,
    queue: TaskQueue,
    connection: ConnectionState,
    events: Vec<EngineEvent>,
}

/// Callback-side handle; clone it into each transport callback
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Mutex<Shared>>,
}

impl EngineHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connection.is_connected()
    }

    /// Number of tasks waiting for the polling step
    pub fn pending_tasks(&self) -> usize {
        self.lock().queue.len()
    }
}

impl TransportEvents for EngineHandle {
    fn on_connect(&self) {
        info!("central connected");
        let mut shared = self.lock();
        shared.connection = ConnectionState::Connected;
        shared.queue.push(PendingTask::FetchAndStoreKey);
        shared.events.push(EngineEvent::Connected);
    }

    fn on_disconnect(&self) {
        info!("central disconnected");
        let mut shared = self.lock();
        shared.connection = ConnectionState::Disconnected;
        shared.framer.reset();
        shared.events.push(EngineEvent::Disconnected);
    }

    fn on_write(&self, data: &[u8]) {
        let mut shared = self.lock();
        let Some(message) = shared.framer.feed(data) else {
            return;
        };

        let command = classify(&message);
        match PendingTask::from_command(&command) {
            Some(task) => {
                debug!("queued {}", task.name());
                if shared.queue.push(task) {
                    debug!("replaced an older task of the same kind");
                }
            }
            None => {
                warn!("dropping unrecognized message ({} bytes)", message.len());
            }
        }
    }
}

/// The polling side of the engine
pub struct Engine<S, I, A, N, D = Ed25519> {
    config: EngineConfig,
    shared: Arc<Mutex<Shared>>,
    store: KeyStore<S>,
    provisioning: ProvisioningClient<I>,
    verifier: Verifier<D>,
    sink: A,
    notifier: N,
    lock_state: LockState,
    banner_until: Option<Instant>,
    next_ping: Option<Instant>,
    ping_counter: u32,
    resume_at: Option<Instant>,
}

impl<S, I, A, N> Engine<S, I, A, N, Ed25519>
where
    S: BlobStorage,
    I: KeyIssuer,
    A: ActuationSink,
    N: Notifier,
{
    pub fn new(config: EngineConfig, storage: S, issuer: I, sink: A, notifier: N) -> Self {
        Self::with_derivation(config, storage, issuer, sink, notifier, Ed25519)
    }
}

impl<S, I, A, N, D> Engine<S, I, A, N, D>
where
    S: BlobStorage,
    I: KeyIssuer,
    A: ActuationSink,
    N: Notifier,
    D: KeyDerivation,
{
    pub fn with_derivation(
        config: EngineConfig,
        storage: S,
        issuer: I,
        mut sink: A,
        notifier: N,
        derivation: D,
    ) -> Self {
        let shared = Shared {
            framer: MessageFramer::with_limit(config.max_message_bytes),
            queue: TaskQueue::new(),
            connection: ConnectionState::default(),
            events: Vec::new(),
        };
        let lock_state = LockState::default();
        sink.set_state(lock_state);

        let provisioning = ProvisioningClient::new(issuer, config.provisioning_timeout());

        Self {
            config,
            shared: Arc::new(Mutex::new(shared)),
            store: KeyStore::new(storage),
            provisioning,
            verifier: Verifier::new(derivation),
            sink,
            notifier,
            lock_state,
            banner_until: None,
            next_ping: None,
            ping_counter: 0,
            resume_at: None,
        }
    }

    /// Handle for the transport adapter
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn key_store(&self) -> &KeyStore<S> {
        &self.store
    }

    pub fn key_store_mut(&mut self) -> &mut KeyStore<S> {
        &mut self.store
    }

    /// Look up the room's service UUID and record it in the config
    ///
    /// Call once before advertising; it blocks on the issuer for at most the
    /// provisioning timeout.
    pub fn resolve_service_uuid(&mut self) -> ServiceUuid {
        let resolved = self.provisioning.resolve_service_uuid(
            &self.config.issuer_url,
            &self.config.room,
            self.store.storage_mut(),
            &self.config.service_uuid,
        );
        self.config.service_uuid = resolved.uuid.clone();
        resolved
    }

    pub fn poll(&mut self) -> PollOutcome {
        self.poll_at(Instant::now())
    }

    /// One polling step at time `now`
    pub fn poll_at(&mut self, now: Instant) -> PollOutcome {
        let (events, task, connected) = {
            let mut shared = self.lock_shared();
            (
                mem::take(&mut shared.events),
                shared.queue.pop(),
                shared.connection.is_connected(),
            )
        };

        let mut outcome = PollOutcome::default();
        for event in events {
            match event {
                EngineEvent::Connected => {
                    self.next_ping = Some(now);
                    self.resume_at = None;
                }
                EngineEvent::Disconnected => {
                    self.next_ping = None;
                    self.resume_at = Some(now + self.config.advertising_resume_delay());
                }
                EngineEvent::ResumeAdvertising => {}
            }
            outcome.events.push(event);
        }

        if let Some(resume_at) = self.resume_at {
            if connected {
                self.resume_at = None;
            } else if now >= resume_at {
                self.resume_at = None;
                outcome.events.push(EngineEvent::ResumeAdvertising);
            }
        }

        if let Some(task) = task {
            outcome.task = Some(self.run(task, now));
        }

        if connected {
            self.ping(now);
        }

        if self.banner_until.is_some_and(|deadline| now >= deadline) {
            self.banner_until = None;
            self.sink.clear_banner();
        }

        outcome
    }

    fn run(&mut self, task: PendingTask, now: Instant) -> TaskReport {
        debug!("running {}", task.name());
        match task {
            PendingTask::FetchAndStoreKey => {
                let result = self.provisioning.fetch_and_store(
                    &self.config.issuer_url,
                    &self.config.room,
                    &mut self.store,
                );
                match result {
                    Ok(material) => {
                        info!("key provisioned for room {}", material.room_number);
                        self.notify(notifications::KEY_PROVISIONED);
                        TaskReport::KeyProvisioned {
                            room: material.room_number,
                        }
                    }
                    Err(e) => {
                        error!("key provisioning failed: {e}");
                        self.notify(notifications::KEY_PROVISIONING_FAILED);
                        TaskReport::ProvisioningFailed(e.to_string())
                    }
                }
            }
            PendingTask::VerifyAndDecide { public_key_base64 } => {
                let verdict = self.verifier.verify(&self.store, &public_key_base64);
                if verdict.is_valid() {
                    info!("unlocking");
                    self.set_state(LockState::Unlocked);
                    self.show_banner(Banner::Unlocked, now);
                    self.notify(notifications::UNLOCKED);
                } else {
                    warn!("authentication failed: {verdict:?}");
                    self.show_banner(Banner::AuthFailed, now);
                    self.notify(notifications::AUTH_FAILED);
                }
                TaskReport::Verified(verdict)
            }
            PendingTask::Lock => {
                info!("locking");
                self.set_state(LockState::Locked);
                self.show_banner(Banner::Locked, now);
                self.notify(notifications::LOCKED);
                TaskReport::Locked
            }
        }
    }

    fn ping(&mut self, now: Instant) {
        let due = self.next_ping.is_none_or(|at| now >= at);
        if !due {
            return;
        }
        let text = notifications::ping(self.ping_counter);
        self.ping_counter = self.ping_counter.wrapping_add(1);
        self.next_ping = Some(now + self.config.ping_interval());
        self.notify(&text);
    }

    fn set_state(&mut self, state: LockState) {
        self.lock_state = state;
        self.sink.set_state(state);
    }

    fn show_banner(&mut self, banner: Banner, now: Instant) {
        self.sink.show_banner(banner);
        self.banner_until = Some(now + self.config.banner_duration());
    }

    fn notify(&mut self, text: &str) {
        if !self.lock_shared().connection.is_connected() {
            debug!("not connected, dropping notification '{text}'");
            return;
        }
        if let Err(e) = self.notifier.notify(text) {
            warn!("notify failed: {e}");
        }
    }

    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleep between polls on hosts without their own scheduler
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

//! SmartLock Device Library
//!
//! The lock-side protocol engine. A firmware (or the host simulator) wires
//! its BLE stack, storage, HTTP client and indicator into an [`Engine`], hands
//! the [`EngineHandle`] to its BLE callbacks and calls [`Engine::poll`] from
//! its main loop.
//!
//! # Example
//!
//! ```ignore
//! use smartlock_device::{DirStorage, Engine, EngineConfig, HttpIssuer};
//! use smartlock_mcu::TransportEvents;
//!
//! let config = EngineConfig::default();
//! let storage = DirStorage::open("/tmp/smartlock")?;
//! let mut engine = Engine::new(config, storage, HttpIssuer::new()?, sink, notifier);
//! let service_uuid = engine.resolve_service_uuid();
//!
//! let handle = engine.handle();
//! ble.advertise(&service_uuid.uuid);
//! ble.on_write(move |data| handle.on_write(data));
//!
//! loop {
//!     for event in engine.poll().events {
//!         // restart advertising on EngineEvent::ResumeAdvertising
//!     }
//!     std::thread::sleep(smartlock_device::POLL_INTERVAL);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod keystore;
pub mod provision;
pub mod queue;
pub mod service_uuid;
pub mod storage;
pub mod verifier;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineEvent, EngineHandle, POLL_INTERVAL, PollOutcome, TaskReport};
pub use keystore::{KeyMaterial, KeyStore, KeyStoreError};
#[cfg(feature = "http")]
pub use provision::HttpIssuer;
pub use provision::{IssuerResponse, KeyIssuer, ProvisioningClient, ProvisioningError};
pub use queue::{PendingTask, TaskQueue};
pub use service_uuid::{ServiceUuid, UuidSource};
pub use storage::{DirStorage, MemoryStorage};
pub use verifier::{
    Ed25519, KeyDerivation, UnavailableReason, VerificationOutcome, Verifier, fingerprint,
};

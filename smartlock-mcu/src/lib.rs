//! SmartLock MCU Library
//!
//! Traits for the collaborators a lock firmware plugs into the protocol
//! engine:
//! - BLE transport events and outbound notifications
//! - the physical lock indicator
//! - flat persistent blob storage
//!
//! # Example implementations
//! - ESP32: See `smartlock-esp32`
//! - Host simulator: See the `smartlock-device` binary

pub mod actuator;
pub mod ble;
pub mod storage;

pub use actuator::*;
pub use ble::*;
pub use storage::*;

//! BLE GATT layout and notification texts for the SmartLock peripheral
//!
//! The lock exposes a single service with one characteristic that is
//! readable, writable and notifying. Centrals write commands to it and
//! subscribe to its notifications for state changes.

/// Advertised device name
pub const DEVICE_NAME: &str = "SmartLock";

/// Default service UUID, overridable per installation
pub const DEFAULT_SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/// Command characteristic UUID (read/write/notify)
pub const COMMAND_UUID: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";

/// Value of the characteristic before anything is notified
pub const INITIAL_VALUE: &[u8] = b"hello";

/// Write size that fits the default ATT MTU of 23 bytes
pub const DEFAULT_WRITE_CHUNK: usize = 20;

/// Notification texts pushed to the connected central
pub mod notifications {
    pub const LOCKED: &str = "locked";
    pub const UNLOCKED: &str = "unlocked";
    pub const AUTH_FAILED: &str = "auth failed";
    pub const KEY_PROVISIONED: &str = "key provisioned";
    pub const KEY_PROVISIONING_FAILED: &str = "key provisioning failed";

    /// Periodic liveness notification
    pub fn ping(counter: u32) -> String {
        format!("ping {counter}")
    }
}

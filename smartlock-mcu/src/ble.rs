//! BLE transport traits for the lock peripheral
//!
//! Protocol constants (UUIDs, notification texts) are in smartlock_proto::ble.

pub use smartlock_proto::ble::{COMMAND_UUID, DEFAULT_SERVICE_UUID, DEVICE_NAME, notifications};

/// Events the transport delivers to the protocol engine
///
/// Called from the BLE stack's own callback context. Implementations must not
/// block: no network, storage or crypto work, and no sleeping.
pub trait TransportEvents {
    /// A central connected
    fn on_connect(&self);

    /// The central disconnected
    fn on_disconnect(&self);

    /// A central wrote `data` to the command characteristic
    fn on_write(&self, data: &[u8]);
}

/// Outbound notifications to the connected central
pub trait Notifier {
    /// Error type for notify operations
    type Error: std::fmt::Display;

    /// Push `text` to the subscribed central
    fn notify(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Connection state as seen by the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }
}

//! Lock indicator traits
//!
//! The physical side of the lock: an LED strip, a solenoid, a display.
//! The engine only decides; the sink renders.

/// Lock state driven by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Locked,
    Unlocked,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Locked => "locked",
            LockState::Unlocked => "unlocked",
        }
    }
}

/// Short-lived status message shown after a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Locked,
    Unlocked,
    AuthFailed,
}

impl Banner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Banner::Locked => "LOCKED!",
            Banner::Unlocked => "UNLOCKED!",
            Banner::AuthFailed => "AUTH FAILED",
        }
    }
}

/// Trait for the lock actuator / indicator
///
/// Called only from the engine's polling step, never from BLE callbacks.
pub trait ActuationSink {
    /// Drive the lock into `state`
    fn set_state(&mut self, state: LockState);

    /// Show a status banner until `clear_banner` is called
    fn show_banner(&mut self, banner: Banner);

    /// Remove the current banner
    fn clear_banner(&mut self);
}

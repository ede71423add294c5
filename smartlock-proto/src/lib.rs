//! SmartLock wire protocol - codec, framing and command grammar
//!
//! Everything in this crate is pure and non-blocking, so it is safe to call
//! from a BLE stack's callback context.

pub mod ble;
pub mod codec;
pub mod command;
pub mod framer;

pub use command::{Command, Request, classify};
pub use framer::MessageFramer;

//! Command grammar for the lock characteristic
//!
//! A complete message is one of:
//! - a PEM-style `ED25519 PUBLIC KEY` block carrying the candidate key
//! - a JSON object `{"command": "lock"}` or
//!   `{"command": "unlock", "public_key": "<base64>"}`
//! - the legacy bare strings `lock` (accepted) and `unlock` (refused: it
//!   carries no key to check)

use log::debug;
use serde::{Deserialize, Serialize};

pub const PEM_BEGIN: &str = "-----BEGIN ED25519 PUBLIC KEY-----";
pub const PEM_END: &str = "-----END ED25519 PUBLIC KEY-----";

pub const CMD_LOCK: &str = "lock";
pub const CMD_UNLOCK: &str = "unlock";

/// Structured request written by a central
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// A classified message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Lock the door, no proof needed
    Lock,
    /// JSON unlock carrying the candidate public key
    UnlockRequest { public_key_base64: String },
    /// PEM block carrying the candidate public key; handled like `UnlockRequest`
    ProvisionEnvelope { public_key_base64: String },
    /// Anything else, including unlock attempts without a key
    Unrecognized,
}

impl Command {
    /// Candidate key to verify, if this command asks for an unlock
    pub fn candidate_key(&self) -> Option<&str> {
        match self {
            Command::UnlockRequest { public_key_base64 }
            | Command::ProvisionEnvelope { public_key_base64 } => Some(public_key_base64),
            Command::Lock | Command::Unrecognized => None,
        }
    }
}

/// Classify a complete message; the first matching rule wins
pub fn classify(message: &str) -> Command {
    if message.contains(PEM_BEGIN) {
        let public_key_base64: String = message
            .replace(PEM_BEGIN, "")
            .replace(PEM_END, "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        debug!("PEM envelope with {} key chars", public_key_base64.len());
        return Command::ProvisionEnvelope { public_key_base64 };
    }

    if let Ok(request) = serde_json::from_str::<Request>(message) {
        return match request.command.as_str() {
            CMD_LOCK => Command::Lock,
            CMD_UNLOCK => match request.public_key {
                Some(public_key_base64) => Command::UnlockRequest { public_key_base64 },
                None => {
                    debug!("unlock request without public_key");
                    Command::Unrecognized
                }
            },
            other => {
                debug!("unknown command '{other}'");
                Command::Unrecognized
            }
        };
    }

    match message {
        CMD_LOCK => Command::Lock,
        CMD_UNLOCK => {
            debug!("legacy unlock without key material");
            Command::Unrecognized
        }
        _ => Command::Unrecognized,
    }
}

/// JSON payload for a lock request
pub fn lock_request() -> String {
    serde_json::json!({ "command": CMD_LOCK }).to_string()
}

/// JSON payload for an unlock request with the given base64 public key
pub fn unlock_request(public_key_base64: &str) -> String {
    serde_json::json!({ "command": CMD_UNLOCK, "public_key": public_key_base64 }).to_string()
}

/// PEM-style envelope carrying the given base64 public key
///
/// The block is multi-line; the framer ends a message at the first newline,
/// so over BLE it has to be flattened to one line first.
pub fn pem_envelope(public_key_base64: &str) -> String {
    format!("{PEM_BEGIN}\n{public_key_base64}\n{PEM_END}")
}

//! Durable key material for the lock
//!
//! Three blobs: the private key (armored base64), the public key (optional)
//! and the room number. The private key is written last and must be a
//! complete armored block to load, so a write torn by a power cut shows up
//! as an error instead of as a shorter key.

use std::fmt;

use log::{debug, info};
use smartlock_mcu::BlobStorage;
use smartlock_proto::codec;

pub const PRIVATE_KEY_BLOB: &str = "/private_key.pem";
pub const PUBLIC_KEY_BLOB: &str = "/public_key.pem";
pub const ROOM_NUMBER_BLOB: &str = "/room_number.txt";

/// Armor label used when the issuer hands out a bare base64 private key
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Largest secret we decode: an Ed25519 seed followed by its public key
pub const MAX_PRIVATE_KEY_BYTES: usize = 64;

/// Key material provisioned for this lock
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Private key text as persisted (armored base64)
    pub private_key: String,
    /// Public key text as handed out by the issuer, if any
    pub public_key: Option<String>,
    pub room_number: String,
}

impl KeyMaterial {
    pub fn new(private_key: &str, public_key: Option<String>, room_number: &str) -> Self {
        let private_key = if codec::is_armored(private_key) {
            private_key.to_string()
        } else {
            format!(
                "-----BEGIN {PRIVATE_KEY_LABEL}-----\n{}\n-----END {PRIVATE_KEY_LABEL}-----\n",
                private_key.trim()
            )
        };
        Self {
            private_key,
            public_key,
            room_number: room_number.to_string(),
        }
    }

    /// Decoded secret bytes, at most `MAX_PRIVATE_KEY_BYTES`
    pub fn private_key_bytes(&self) -> Vec<u8> {
        codec::decode(&codec::strip_armor(&self.private_key), MAX_PRIVATE_KEY_BYTES)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("room_number", &self.room_number)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("storage error on {name}: {message}")]
    Storage { name: &'static str, message: String },
    #[error("stored {0} is incomplete")]
    Torn(&'static str),
    #[error("stored {0} is not valid UTF-8")]
    Encoding(&'static str),
}

impl KeyStoreError {
    pub(crate) fn storage(name: &'static str, e: impl fmt::Display) -> Self {
        KeyStoreError::Storage {
            name,
            message: e.to_string(),
        }
    }
}

/// Key material store over a blob storage backend
pub struct KeyStore<S> {
    storage: S,
}

impl<S: BlobStorage> KeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn has_key(&self) -> bool {
        self.storage.exists(PRIVATE_KEY_BLOB)
    }

    /// Persist `material`, replacing whatever was stored
    pub fn save(&mut self, material: &KeyMaterial) -> Result<(), KeyStoreError> {
        self.storage
            .write(ROOM_NUMBER_BLOB, material.room_number.as_bytes())
            .map_err(|e| KeyStoreError::storage(ROOM_NUMBER_BLOB, e))?;

        match &material.public_key {
            Some(public_key) => self.storage.write(PUBLIC_KEY_BLOB, public_key.as_bytes()),
            None => self.storage.remove(PUBLIC_KEY_BLOB),
        }
        .map_err(|e| KeyStoreError::storage(PUBLIC_KEY_BLOB, e))?;

        self.storage
            .write(PRIVATE_KEY_BLOB, material.private_key.as_bytes())
            .map_err(|e| KeyStoreError::storage(PRIVATE_KEY_BLOB, e))?;

        info!("key material saved for room {}", material.room_number);
        Ok(())
    }

    /// Load stored material; `None` when nothing was provisioned yet
    pub fn load(&self) -> Result<Option<KeyMaterial>, KeyStoreError> {
        let Some(private_key) = self.read_text(PRIVATE_KEY_BLOB)? else {
            debug!("no private key stored");
            return Ok(None);
        };
        if !codec::is_armored(&private_key) {
            return Err(KeyStoreError::Torn(PRIVATE_KEY_BLOB));
        }

        let public_key = self.read_text(PUBLIC_KEY_BLOB)?;
        let room_number = self.read_text(ROOM_NUMBER_BLOB)?.unwrap_or_default();

        Ok(Some(KeyMaterial {
            private_key,
            public_key,
            room_number: room_number.trim().to_string(),
        }))
    }

    /// Remove all key material
    pub fn clear(&mut self) -> Result<(), KeyStoreError> {
        for name in [PRIVATE_KEY_BLOB, PUBLIC_KEY_BLOB, ROOM_NUMBER_BLOB] {
            self.storage
                .remove(name)
                .map_err(|e| KeyStoreError::storage(name, e))?;
        }
        info!("key material cleared");
        Ok(())
    }

    fn read_text(&self, name: &'static str) -> Result<Option<String>, KeyStoreError> {
        match self.storage.read(name) {
            Ok(Some(data)) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| KeyStoreError::Encoding(name)),
            Ok(None) => Ok(None),
            Err(e) => Err(KeyStoreError::storage(name, e)),
        }
    }
}

//! Per-room Ed25519 keys kept as files under the issuer home
//!
//! `<home>/<room>.secret` holds the base64 of the 32-byte seed. The room's
//! BLE service UUID is derived from its public key.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use ed25519_dalek::SigningKey;
use log::info;
use rand::rngs::OsRng;
use smartlock_proto::codec;
use uuid::Uuid;

/// Armor label of the private key handed to locks
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

const MAX_ROOM_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    #[error("invalid room name: {0:?}")]
    InvalidRoom(String),
    #[error("key for room {0} already exists")]
    AlreadyExists(String),
    #[error("failed to access key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid key file {0}")]
    Parse(PathBuf),
}

/// Room names become file names: `[A-Za-z0-9_-]{1,64}`
pub fn validate_room(room: &str) -> Result<(), KeyFileError> {
    let valid = !room.is_empty()
        && room.len() <= MAX_ROOM_LEN
        && room
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(KeyFileError::InvalidRoom(room.to_string()))
    }
}

/// The key of one room
pub struct RoomKey {
    room: String,
    signing: SigningKey,
}

impl RoomKey {
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Seed and public key, armored, as stored by the lock
    pub fn private_key_armored(&self) -> String {
        codec::armor(PRIVATE_KEY_LABEL, &self.signing.to_keypair_bytes())
    }

    pub fn public_key_base64(&self) -> String {
        codec::encode(&self.signing.verifying_key().to_bytes())
    }

    /// BLE service UUID the room's lock advertises, stable for the key
    pub fn service_uuid(&self) -> Uuid {
        let public = self.signing.verifying_key().to_bytes();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&public[..16]);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Directory of room keys
pub struct KeyDir {
    root: PathBuf,
    create_lock: Mutex<()>,
}

impl KeyDir {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, KeyFileError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| KeyFileError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            create_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, room: &str) -> PathBuf {
        self.root.join(format!("{room}.secret"))
    }

    /// Generate a key for `room`; fails if one exists
    pub fn create(&self, room: &str) -> Result<RoomKey, KeyFileError> {
        validate_room(room)?;
        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.path(room).exists() {
            return Err(KeyFileError::AlreadyExists(room.to_string()));
        }
        self.generate(room)
    }

    pub fn read(&self, room: &str) -> Result<Option<RoomKey>, KeyFileError> {
        validate_room(room)?;
        let path = self.path(room);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(KeyFileError::Io { path, source }),
        };

        let seed: [u8; 32] = codec::decode_all(content.trim())
            .try_into()
            .map_err(|_| KeyFileError::Parse(path))?;
        Ok(Some(RoomKey {
            room: room.to_string(),
            signing: SigningKey::from_bytes(&seed),
        }))
    }

    /// Read the key of `room`, generating it on first use
    pub fn get_or_create(&self, room: &str) -> Result<RoomKey, KeyFileError> {
        if let Some(key) = self.read(room)? {
            return Ok(key);
        }
        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // another request may have won the race
        match self.read(room)? {
            Some(key) => Ok(key),
            None => self.generate(room),
        }
    }

    fn generate(&self, room: &str) -> Result<RoomKey, KeyFileError> {
        let signing = SigningKey::generate(&mut OsRng);
        let path = self.path(room);
        std::fs::write(&path, codec::encode(signing.as_bytes())).map_err(|source| {
            KeyFileError::Io {
                path: path.clone(),
                source,
            }
        })?;
        info!("created key for room {room} at {}", path.display());
        Ok(RoomKey {
            room: room.to_string(),
            signing,
        })
    }
}

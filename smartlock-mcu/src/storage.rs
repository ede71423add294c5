//! Persistent Storage Abstraction Traits
//!
//! Flat named-blob storage for key material (LittleFS or NVS on MCUs, a
//! directory on hosts).

/// Trait for persistent blob storage
///
/// MCU-specific crates implement this trait using their storage backend.
/// Names look like file paths (`/private_key.pem`); backends with shorter
/// key limits map them as they see fit.
pub trait BlobStorage {
    /// Error type for storage operations
    type Error: std::fmt::Display;

    /// Write `data` under `name`, replacing any previous value
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Read the blob stored under `name`
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Remove the blob stored under `name`; removing a missing blob is not an error
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Check whether `name` exists
    fn exists(&self, name: &str) -> bool {
        matches!(self.read(name), Ok(Some(_)))
    }
}

//! Service UUID lookup for the lock's room
//!
//! The issuer lists the BLE service UUIDs of a room and the lock advertises
//! the first one. A fetched list is persisted, one UUID per line, so a lock
//! that boots without network still advertises the last UUID it was given.
//! With neither, the configured UUID is used.

use log::{info, warn};
use serde::Deserialize;
use smartlock_mcu::BlobStorage;
use uuid::Uuid;

use crate::keystore::KeyStoreError;
use crate::provision::{KeyIssuer, ProvisioningClient, ProvisioningError};

pub const SERVICE_UUIDS_BLOB: &str = "/ble_uuids.txt";

/// Where the advertised service UUID came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidSource {
    Issuer,
    Stored,
    Configured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUuid {
    pub uuid: String,
    pub source: UuidSource,
}

#[derive(Debug, Deserialize)]
struct ServiceUuidsResponse {
    #[serde(default)]
    ble_uuids: Vec<String>,
}

pub fn service_uuids_url(issuer_base: &str, room: &str) -> String {
    format!("{}/api/keys/{room}/ble-uuids", issuer_base.trim_end_matches('/'))
}

/// Valid UUIDs from `entries`, normalized to lowercase hyphenated form
fn normalize<'a>(entries: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match Uuid::parse_str(entry) {
            Ok(uuid) => Some(uuid.hyphenated().to_string()),
            Err(e) => {
                warn!("skipping service UUID {entry:?}: {e}");
                None
            }
        })
        .collect()
}

pub fn save_service_uuids<S: BlobStorage>(
    storage: &mut S,
    uuids: &[String],
) -> Result<(), KeyStoreError> {
    let mut text = uuids.join("\n");
    text.push('\n');
    storage
        .write(SERVICE_UUIDS_BLOB, text.as_bytes())
        .map_err(|e| KeyStoreError::storage(SERVICE_UUIDS_BLOB, e))
}

/// Stored UUIDs; empty when none were saved
pub fn load_service_uuids<S: BlobStorage>(storage: &S) -> Result<Vec<String>, KeyStoreError> {
    let data = match storage.read(SERVICE_UUIDS_BLOB) {
        Ok(Some(data)) => data,
        Ok(None) => return Ok(Vec::new()),
        Err(e) => return Err(KeyStoreError::storage(SERVICE_UUIDS_BLOB, e)),
    };
    let text =
        String::from_utf8(data).map_err(|_| KeyStoreError::Encoding(SERVICE_UUIDS_BLOB))?;
    Ok(normalize(text.lines()))
}

impl<I: KeyIssuer> ProvisioningClient<I> {
    /// Service UUIDs the issuer lists for `room`
    pub fn fetch_service_uuids(
        &self,
        issuer_base: &str,
        room: &str,
    ) -> Result<Vec<String>, ProvisioningError> {
        let url = service_uuids_url(issuer_base, room);
        info!("requesting service UUIDs: {url}");

        let body: ServiceUuidsResponse = serde_json::from_slice(&self.get_ok(&url)?)
            .map_err(|e| ProvisioningError::Malformed(e.to_string()))?;
        let uuids = normalize(body.ble_uuids.iter().map(String::as_str));
        if uuids.is_empty() {
            return Err(ProvisioningError::NoServiceUuids);
        }
        Ok(uuids)
    }

    pub fn fetch_and_store_service_uuids<S: BlobStorage>(
        &self,
        issuer_base: &str,
        room: &str,
        storage: &mut S,
    ) -> Result<Vec<String>, ProvisioningError> {
        let uuids = self.fetch_service_uuids(issuer_base, room)?;
        save_service_uuids(storage, &uuids)?;
        info!("saved {} service UUID(s)", uuids.len());
        Ok(uuids)
    }

    /// Issuer first, then the stored list, then `configured`
    pub fn resolve_service_uuid<S: BlobStorage>(
        &self,
        issuer_base: &str,
        room: &str,
        storage: &mut S,
        configured: &str,
    ) -> ServiceUuid {
        let fetched = match self.fetch_and_store_service_uuids(issuer_base, room, storage) {
            Ok(uuids) => uuids,
            Err(e) => {
                warn!("service UUID fetch failed: {e}");
                Vec::new()
            }
        };
        if let Some(uuid) = fetched.into_iter().next() {
            return ServiceUuid {
                uuid,
                source: UuidSource::Issuer,
            };
        }

        match load_service_uuids(storage) {
            Ok(stored) => {
                if let Some(uuid) = stored.into_iter().next() {
                    info!("using stored service UUID {uuid}");
                    return ServiceUuid {
                        uuid,
                        source: UuidSource::Stored,
                    };
                }
            }
            Err(e) => warn!("cannot read stored service UUIDs: {e}"),
        }

        info!("using configured service UUID {configured}");
        ServiceUuid {
            uuid: configured.to_string(),
            source: UuidSource::Configured,
        }
    }
}

//! Key provisioning from the remote issuer
//!
//! One `GET <issuer>/api/keys/<room>/private` per attempt, bounded by a
//! timeout. The store is only written after the whole response checked out,
//! and nothing is retried here: the next connection triggers the next attempt.

use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use smartlock_mcu::BlobStorage;

use crate::keystore::{KeyMaterial, KeyStore, KeyStoreError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw response from the issuer
#[derive(Debug, Clone)]
pub struct IssuerResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Request/response channel to the key issuer
///
/// Implementations block for at most `timeout`.
pub trait KeyIssuer {
    /// Error type for transport failures
    type Error: std::fmt::Display;

    fn get(&self, url: &str, timeout: Duration) -> Result<IssuerResponse, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("issuer request failed: {0}")]
    Transport(String),
    #[error("malformed issuer response: {0}")]
    Malformed(String),
    #[error("failed to store key material: {0}")]
    Storage(#[from] KeyStoreError),
    #[error("issuer listed no usable service UUIDs")]
    NoServiceUuids,
}

/// Body of a successful private key response
#[derive(Debug, Deserialize)]
struct PrivateKeyResponse {
    private_key: String,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    room_number: Option<String>,
}

pub fn private_key_url(issuer_base: &str, room: &str) -> String {
    format!("{}/api/keys/{room}/private", issuer_base.trim_end_matches('/'))
}

pub struct ProvisioningClient<I> {
    issuer: I,
    timeout: Duration,
}

impl<I: KeyIssuer> ProvisioningClient<I> {
    pub fn new(issuer: I, timeout: Duration) -> Self {
        Self { issuer, timeout }
    }

    /// Fetch key material for `room` without storing it
    pub fn fetch(&self, issuer_base: &str, room: &str) -> Result<KeyMaterial, ProvisioningError> {
        let url = private_key_url(issuer_base, room);
        info!("requesting key material: {url}");

        let body: PrivateKeyResponse = serde_json::from_slice(&self.get_ok(&url)?)
            .map_err(|e| ProvisioningError::Malformed(e.to_string()))?;

        let room_number = body.room_number.unwrap_or_else(|| room.to_string());
        Ok(KeyMaterial::new(&body.private_key, body.public_key, &room_number))
    }

    /// Fetch key material and commit it to `store`
    pub fn fetch_and_store<S: BlobStorage>(
        &self,
        issuer_base: &str,
        room: &str,
        store: &mut KeyStore<S>,
    ) -> Result<KeyMaterial, ProvisioningError> {
        let material = self.fetch(issuer_base, room)?;
        store.save(&material)?;
        Ok(material)
    }

    /// Body of a `200` answer to `GET url`; any other status is a transport error
    pub(crate) fn get_ok(&self, url: &str) -> Result<Vec<u8>, ProvisioningError> {
        let response = self
            .issuer
            .get(url, self.timeout)
            .map_err(|e| ProvisioningError::Transport(e.to_string()))?;

        if response.status != 200 {
            warn!("issuer answered HTTP {}", response.status);
            return Err(ProvisioningError::Transport(format!(
                "HTTP status {}",
                response.status
            )));
        }
        Ok(response.body)
    }
}

/// Blocking HTTP issuer client
#[cfg(feature = "http")]
pub struct HttpIssuer {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpIssuer {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl KeyIssuer for HttpIssuer {
    type Error = reqwest::Error;

    fn get(&self, url: &str, timeout: Duration) -> Result<IssuerResponse, Self::Error> {
        let response = self.client.get(url).timeout(timeout).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(IssuerResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::cell::RefCell;

    struct StubIssuer {
        reply: Result<IssuerResponse, String>,
        urls: RefCell<Vec<String>>,
    }

    impl StubIssuer {
        fn status(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(IssuerResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                urls: RefCell::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                reply: Err("connection refused".to_string()),
                urls: RefCell::new(Vec::new()),
            }
        }
    }

    impl KeyIssuer for StubIssuer {
        type Error = String;

        fn get(&self, url: &str, timeout: Duration) -> Result<IssuerResponse, String> {
            assert_eq!(timeout, DEFAULT_TIMEOUT);
            self.urls.borrow_mut().push(url.to_string());
            self.reply.clone()
        }
    }

    fn client(issuer: StubIssuer) -> ProvisioningClient<StubIssuer> {
        ProvisioningClient::new(issuer, DEFAULT_TIMEOUT)
    }

    #[test]
    fn builds_private_key_url() {
        assert_eq!(
            private_key_url("http://issuer:8081/", "101"),
            "http://issuer:8081/api/keys/101/private"
        );
    }

    #[test]
    fn success_with_all_fields() {
        let client = client(StubIssuer::status(
            200,
            r#"{"private_key":"AAAA","public_key":"BBBB","room_number":"202"}"#,
        ));
        let mut store = KeyStore::new(MemoryStorage::new());

        let material = client
            .fetch_and_store("http://issuer", "101", &mut store)
            .unwrap();

        assert_eq!(material.public_key.as_deref(), Some("BBBB"));
        assert_eq!(material.room_number, "202");
        assert_eq!(store.load().unwrap().unwrap(), material);
        assert_eq!(
            client.issuer.urls.borrow().as_slice(),
            ["http://issuer/api/keys/101/private"]
        );
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let client = client(StubIssuer::status(200, r#"{"private_key":"AAAA"}"#));
        let material = client.fetch("http://issuer", "101").unwrap();
        assert_eq!(material.public_key, None);
        assert_eq!(material.room_number, "101");
    }

    #[test]
    fn missing_private_key_is_malformed() {
        let client = client(StubIssuer::status(200, r#"{"public_key":"BBBB"}"#));
        assert!(matches!(
            client.fetch("http://issuer", "101"),
            Err(ProvisioningError::Malformed(_))
        ));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let client = client(StubIssuer::status(200, "<html>oops</html>"));
        assert!(matches!(
            client.fetch("http://issuer", "101"),
            Err(ProvisioningError::Malformed(_))
        ));
    }

    #[test]
    fn server_error_leaves_store_untouched() {
        let mut store = KeyStore::new(MemoryStorage::new());
        let previous = KeyMaterial::new("CCCC", None, "101");
        store.save(&previous).unwrap();

        let client = client(StubIssuer::status(500, r#"{"private_key":"AAAA"}"#));
        let err = client
            .fetch_and_store("http://issuer", "101", &mut store)
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::Transport(_)));
        assert_eq!(store.load().unwrap().unwrap(), previous);
    }

    #[test]
    fn unreachable_issuer_is_transport_error() {
        let client = client(StubIssuer::unreachable());
        let err = client.fetch("http://issuer", "101").unwrap_err();
        assert!(matches!(err, ProvisioningError::Transport(ref m) if m.contains("refused")));
    }
}

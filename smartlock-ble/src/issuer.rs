//! Public key lookup at the key issuer

use log::info;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    public_key: String,
}

pub fn public_key_url(issuer_base: &str, room: &str) -> String {
    format!("{}/api/keys/{room}/public", issuer_base.trim_end_matches('/'))
}

/// Fetch the base64 public key of `room`
pub async fn fetch_public_key(
    issuer_base: &str,
    room: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let url = public_key_url(issuer_base, room);
    info!("fetching public key: {url}");

    let response = reqwest::get(&url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("issuer answered {status} for room {room}").into());
    }

    let body: PublicKeyResponse = serde_json::from_slice(&response.bytes().await?)?;
    Ok(body.public_key)
}

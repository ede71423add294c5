//! Key issuer client on the ESP-IDF HTTP stack

use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::io::Read;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use smartlock_device::{IssuerResponse, KeyIssuer};

/// Upper bound on a key response body
const MAX_BODY_LEN: usize = 4096;

pub struct EspIssuer;

impl KeyIssuer for EspIssuer {
    type Error = anyhow::Error;

    fn get(&self, url: &str, timeout: Duration) -> Result<IssuerResponse, Self::Error> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(timeout),
            ..Default::default()
        })?;
        let mut client = Client::wrap(connection);

        let mut response = client.get(url)?.submit()?;
        let status = response.status();

        let mut body = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if body.len() + n > MAX_BODY_LEN {
                anyhow::bail!("issuer response larger than {MAX_BODY_LEN} bytes");
            }
            body.extend_from_slice(&buf[..n]);
        }

        Ok(IssuerResponse { status, body })
    }
}

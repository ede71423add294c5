//! Issuer routes
//!
//! - `GET /api/keys/<room>/private`: key material for the lock, created on first use
//! - `GET /api/keys/<room>/public`: public key for centrals, 404 for unknown rooms
//! - `GET /api/keys/<room>/ble-uuids`: service UUIDs the lock advertises, created on first use
//! - `GET /health`

use serde::Serialize;

use crate::http::HttpResult;
use crate::keys::{KeyDir, KeyFileError, RoomKey};

#[derive(Debug, Serialize)]
pub struct PrivateKeyResponse {
    pub private_key: String,
    pub public_key: String,
    pub room_number: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
    pub room_number: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceUuidsResponse {
    pub ble_uuids: Vec<String>,
    pub room_number: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Health,
    Private(&'a str),
    Public(&'a str),
    ServiceUuids(&'a str),
}

fn parse(path: &str) -> Option<Route<'_>> {
    if path == "/health" {
        return Some(Route::Health);
    }
    let rest = path.strip_prefix("/api/keys/")?;
    let (room, kind) = rest.split_once('/')?;
    match kind {
        "private" => Some(Route::Private(room)),
        "public" => Some(Route::Public(room)),
        "ble-uuids" => Some(Route::ServiceUuids(room)),
        _ => None,
    }
}

pub fn route(method: &hyper::Method, path: &str, keys: &KeyDir) -> HttpResult {
    let Some(route) = parse(path) else {
        return smartlock_issuer::not_found!("not found: {path}");
    };
    if method != hyper::Method::GET {
        return smartlock_issuer::method_not_allowed!("{method} not allowed on {path}");
    }

    match route {
        Route::Health => smartlock_issuer::http::bytes_to_resp(b"ok".to_vec(), hyper::StatusCode::OK),
        Route::Private(room) => match keys.get_or_create(room) {
            Ok(key) => smartlock_issuer::http::json(private_response(&key)),
            Err(e) => key_error(e),
        },
        Route::Public(room) => match keys.read(room) {
            Ok(Some(key)) => smartlock_issuer::http::json(PublicKeyResponse {
                public_key: key.public_key_base64(),
                room_number: key.room().to_string(),
            }),
            Ok(None) => smartlock_issuer::not_found!("no key for room {room}"),
            Err(e) => key_error(e),
        },
        Route::ServiceUuids(room) => match keys.get_or_create(room) {
            Ok(key) => smartlock_issuer::http::json(ServiceUuidsResponse {
                ble_uuids: vec![key.service_uuid().hyphenated().to_string()],
                room_number: key.room().to_string(),
            }),
            Err(e) => key_error(e),
        },
    }
}

fn private_response(key: &RoomKey) -> PrivateKeyResponse {
    PrivateKeyResponse {
        private_key: key.private_key_armored(),
        public_key: key.public_key_base64(),
        room_number: key.room().to_string(),
    }
}

fn key_error(e: KeyFileError) -> HttpResult {
    match e {
        KeyFileError::InvalidRoom(_) => smartlock_issuer::bad_request!("{e}"),
        e => smartlock_issuer::server_error!("{e}"),
    }
}

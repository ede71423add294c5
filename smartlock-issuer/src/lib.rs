extern crate self as smartlock_issuer;

pub mod http;
pub mod keys;
pub mod routes;

pub use keys::{KeyDir, KeyFileError, RoomKey, validate_room};

pub const ENV_HOME: &str = "SMARTLOCK_ISSUER_HOME";

/// Key directory: SMARTLOCK_ISSUER_HOME, else ~/.smartlock-issuer
pub fn issuer_home() -> Option<std::path::PathBuf> {
    match std::env::var_os(ENV_HOME) {
        Some(home) => Some(home.into()),
        None => dirs::home_dir().map(|home| home.join(".smartlock-issuer")),
    }
}

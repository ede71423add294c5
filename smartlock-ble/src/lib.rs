//! SmartLock BLE Client
//!
//! Central-side client for SmartLock devices.
//!
//! # Example
//!
//! ```ignore
//! use smartlock_ble::{ble, issuer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Scan for devices
//!     let devices = ble::scan(5).await?;
//!     for device in &devices {
//!         println!("{} ({})", device.name, device.address);
//!     }
//!
//!     // Unlock with the room's public key
//!     let key = issuer::fetch_public_key("http://127.0.0.1:8081", "101").await?;
//!     for text in ble::unlock(None, &key, 20).await? {
//!         println!("RX: {text}");
//!     }
//!
//!     // Lock again
//!     ble::lock(None, 20).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod issuer;

//! BLE client for SmartLock devices
//!
//! Scans for locks, writes commands to the command characteristic in
//! packet-sized chunks and collects the notifications that come back.

use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info};
use std::time::Duration;
use uuid::Uuid;

use smartlock_proto::ble::{COMMAND_UUID, DEVICE_NAME};
use smartlock_proto::command::{lock_request, unlock_request};

/// How long to listen for notifications after a command
pub const LISTEN_WINDOW: Duration = Duration::from_secs(3);

/// A discovered BLE device
#[derive(Debug, Clone)]
pub struct LockDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_lock: bool,
}

/// Parse UUID string into uuid::Uuid
fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in smartlock_proto")
}

/// Match "SmartLock" or "nimble [SmartLock]" names
fn is_lock_name(name: &str) -> bool {
    name.starts_with(DEVICE_NAME) || name.contains(&format!("[{DEVICE_NAME}"))
}

/// Split `payload` into write-sized packets; a zero size sends it whole
pub fn packets(payload: &[u8], chunk: usize) -> Vec<&[u8]> {
    if chunk == 0 || payload.is_empty() {
        return vec![payload];
    }
    payload.chunks(chunk).collect()
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, Box<dyn std::error::Error>> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or_else(|| "No Bluetooth adapter found".into())
}

/// Scan for BLE devices
///
/// Returns every device seen. SmartLock devices have `is_lock = true`.
pub async fn scan(duration_secs: u64) -> Result<Vec<LockDevice>, Box<dyn std::error::Error>> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    let peripherals = adapter.peripherals().await?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let address = peripheral.address().to_string();
            let rssi = props.rssi;
            let is_lock = is_lock_name(&name);

            devices.push(LockDevice { name, address, rssi, is_lock });
        }
    }

    adapter.stop_scan().await?;
    Ok(devices)
}

/// Find a device by name/address pattern, or any SmartLock
pub async fn find_device(target: Option<&str>) -> Result<Peripheral, Box<dyn std::error::Error>> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let addr = peripheral.address().to_string();

            let matches = match target {
                Some(t) => name.contains(t) || addr.contains(t),
                None => is_lock_name(&name),
            };

            if matches {
                adapter.stop_scan().await?;
                info!("found device: {name} ({addr})");
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err("No SmartLock device found".into())
}

/// Write `payload` to the command characteristic and collect notifications
///
/// # Arguments
/// * `target` - Device name/address pattern, or None to find any SmartLock
/// * `payload` - Complete message, terminator included
/// * `chunk` - Bytes per write
/// * `listen` - How long to wait for notifications after the last write
pub async fn send_command(
    target: Option<&str>,
    payload: &[u8],
    chunk: usize,
    listen: Duration,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let device = find_device(target).await?;

    device.connect().await?;
    device.discover_services().await?;

    let cmd_uuid = parse_uuid(COMMAND_UUID);
    let cmd_char = device
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == cmd_uuid)
        .ok_or("Command characteristic not found")?;

    let mut notifications = if cmd_char.properties.contains(CharPropFlags::NOTIFY) {
        device.subscribe(&cmd_char).await?;
        Some(device.notifications().await?)
    } else {
        None
    };

    for packet in packets(payload, chunk) {
        debug!("write {} bytes", packet.len());
        device.write(&cmd_char, packet, WriteType::WithResponse).await?;
    }

    let mut received = Vec::new();
    if let Some(stream) = notifications.as_mut() {
        let deadline = tokio::time::Instant::now() + listen;
        while let Ok(Some(notification)) = tokio::time::timeout_at(deadline, stream.next()).await {
            if notification.uuid == cmd_uuid {
                received.push(String::from_utf8_lossy(&notification.value).into_owned());
            }
        }
    }

    let _ = device.disconnect().await;
    Ok(received)
}

/// Lock a device; no key needed
pub async fn lock(
    target: Option<&str>,
    chunk: usize,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    send_command(target, lock_request().as_bytes(), chunk, LISTEN_WINDOW).await
}

/// Unlock a device with the room's base64 public key
pub async fn unlock(
    target: Option<&str>,
    public_key_base64: &str,
    chunk: usize,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let payload = unlock_request(public_key_base64);
    send_command(target, payload.as_bytes(), chunk, LISTEN_WINDOW).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartlock_proto::MessageFramer;

    #[test]
    fn packets_respect_chunk_size() {
        let payload = unlock_request("MCowBQYDK2VwAyEAexample+key/base64==");
        let parts = packets(payload.as_bytes(), 20);
        assert!(parts.iter().all(|p| p.len() <= 20));
        assert_eq!(parts.concat(), payload.as_bytes());
    }

    #[test]
    fn chunked_request_reassembles_on_the_lock() {
        let payload = unlock_request("c29tZSBwdWJsaWMga2V5IGJ5dGVzIGhlcmU=");
        let mut framer = MessageFramer::new();
        let mut messages = Vec::new();
        for packet in packets(payload.as_bytes(), 20) {
            messages.extend(framer.feed(packet));
        }
        assert_eq!(messages, vec![payload]);
    }

    #[test]
    fn zero_chunk_sends_whole_payload() {
        assert_eq!(packets(b"lock\n", 0), vec![&b"lock\n"[..]]);
    }

    #[test]
    fn lock_names() {
        assert!(is_lock_name("SmartLock"));
        assert!(is_lock_name("nimble [SmartLock]"));
        assert!(!is_lock_name("Headphones"));
    }
}

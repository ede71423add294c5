//! NimBLE GATT server for the lock
//!
//! One service with one characteristic (read / write / notify). BLE callbacks
//! only forward to the engine handle; all work happens in the main loop.

use std::sync::Arc;

use esp32_nimble::utilities::mutex::Mutex as NimbleMutex;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{uuid128, BLEAdvertisementData, BLECharacteristic, BLEDevice, NimbleProperties};
use log::*;
use smartlock_device::EngineHandle;
use smartlock_mcu::{Notifier, TransportEvents};
use smartlock_proto::ble::INITIAL_VALUE;

// Must match smartlock_proto::ble::COMMAND_UUID
const COMMAND_UUID: BleUuid = uuid128!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

pub type SharedCharacteristic = Arc<NimbleMutex<BLECharacteristic>>;

/// Pushes notifications on the command characteristic once it is attached
#[derive(Default)]
pub struct BleNotifier {
    characteristic: Option<SharedCharacteristic>,
}

impl BleNotifier {
    pub fn attach(&mut self, characteristic: SharedCharacteristic) {
        self.characteristic = Some(characteristic);
    }
}

impl Notifier for BleNotifier {
    type Error = &'static str;

    fn notify(&mut self, text: &str) -> Result<(), Self::Error> {
        let characteristic = self.characteristic.as_ref().ok_or("BLE server not started")?;
        characteristic.lock().set_value(text.as_bytes()).notify();
        Ok(())
    }
}

/// Start the GATT server and advertising; returns the command characteristic
pub fn start_ble_server(
    device_name: &str,
    service_uuid: &str,
    handle: EngineHandle,
) -> anyhow::Result<SharedCharacteristic> {
    let service_uuid = BleUuid::from_uuid128_string(service_uuid)
        .map_err(|e| anyhow::anyhow!("invalid service UUID {service_uuid}: {e:?}"))?;

    let ble_device = BLEDevice::take();
    BLEDevice::set_device_name(device_name)
        .map_err(|e| anyhow::anyhow!("failed to set device name: {:?}", e))?;

    let server = ble_device.get_server();
    // advertising resumes when the engine says so
    server.advertise_on_disconnect(false);

    let connect_handle = handle.clone();
    server.on_connect(move |server, desc| {
        info!("BLE client connected");
        let _ = server.update_conn_params(desc.conn_handle(), 24, 48, 0, 60);
        connect_handle.on_connect();
    });

    let disconnect_handle = handle.clone();
    server.on_disconnect(move |_desc, _reason| {
        info!("BLE client disconnected");
        disconnect_handle.on_disconnect();
    });

    let service = server.create_service(service_uuid);
    let characteristic = service.lock().create_characteristic(
        COMMAND_UUID,
        NimbleProperties::READ | NimbleProperties::WRITE | NimbleProperties::NOTIFY,
    );
    characteristic.lock().set_value(INITIAL_VALUE);

    characteristic.lock().on_write(move |args| {
        let data = args.recv_data();
        debug!("BLE: received {} bytes", data.len());
        handle.on_write(data);
    });

    ble_device.get_advertising().lock().set_data(
        BLEAdvertisementData::new()
            .name(device_name)
            .add_service_uuid(service_uuid),
    )
    .map_err(|e| anyhow::anyhow!("failed to set advertising data: {:?}", e))?;
    start_advertising()?;
    info!("BLE advertising started as '{}'", device_name);

    Ok(characteristic)
}

pub fn start_advertising() -> anyhow::Result<()> {
    BLEDevice::take()
        .get_advertising()
        .lock()
        .start()
        .map_err(|e| anyhow::anyhow!("failed to start advertising: {:?}", e))
}

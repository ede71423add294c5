//! SmartLock firmware for ESP32
//!
//! Advertises the lock over BLE, fetches the room key from the issuer when a
//! central connects and unlocks when the central presents the matching
//! public key.

mod ble;
mod indicator;
mod issuer;
mod storage;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{gpio::PinDriver, prelude::Peripherals},
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::*;
use smartlock_device::{Engine, EngineConfig, EngineEvent, POLL_INTERVAL};
use smartlock_proto::ble::DEVICE_NAME;

// Build-time configuration
const WIFI_SSID: Option<&str> = option_env!("SMARTLOCK_WIFI_SSID");
const WIFI_PASS: Option<&str> = option_env!("SMARTLOCK_WIFI_PASS");
const ISSUER_URL: Option<&str> = option_env!("SMARTLOCK_ISSUER_URL");
const ROOM: Option<&str> = option_env!("SMARTLOCK_ROOM");

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("SmartLock v0.1");
    info!("Initializing...");

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // GPIO2 is the built-in LED on most ESP32 dev boards
    let led = PinDriver::output(peripherals.pins.gpio2)?;
    let sink = indicator::LedIndicator::new(led);

    let storage = storage::NvsStorage::open(&nvs)?;

    let mut config = EngineConfig::default();
    if let Some(url) = ISSUER_URL {
        config.issuer_url = url.to_string();
    }
    if let Some(room) = ROOM {
        config.room = room.to_string();
    }
    info!("Room {} via issuer {}", config.room, config.issuer_url);

    // Provisioning needs the network
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs.clone()))?,
        sys_loop,
    )?;
    if let Err(e) = connect_wifi(&mut wifi) {
        warn!("WiFi unavailable, key provisioning will fail: {:?}", e);
    }

    // The BLE callbacks need the engine handle, so the characteristic is
    // attached to the notifier after the engine exists.
    let mut engine = Engine::new(
        config,
        storage,
        issuer::EspIssuer,
        sink,
        ble::BleNotifier::default(),
    );
    let service_uuid = engine.resolve_service_uuid();
    info!("Service UUID {} ({:?})", service_uuid.uuid, service_uuid.source);
    let characteristic = ble::start_ble_server(DEVICE_NAME, &service_uuid.uuid, engine.handle())?;
    engine.notifier_mut().attach(characteristic);

    loop {
        let outcome = engine.poll();
        for event in outcome.events {
            if event == EngineEvent::ResumeAdvertising {
                match ble::start_advertising() {
                    Ok(()) => info!("Restarted advertising after disconnect"),
                    Err(e) => error!("Failed to restart advertising: {:?}", e),
                }
            }
        }
        if let Some(report) = outcome.task {
            debug!("task finished: {:?}", report);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> anyhow::Result<()> {
    let (Some(ssid), Some(pass)) = (WIFI_SSID, WIFI_PASS) else {
        anyhow::bail!("SMARTLOCK_WIFI_SSID / SMARTLOCK_WIFI_PASS not set at build time");
    };

    let wifi_config = Configuration::Client(ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long"))?,
        password: pass
            .try_into()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        ..Default::default()
    });

    wifi.set_configuration(&wifi_config)?;
    wifi.start()?;
    info!("WiFi started, connecting to {}...", ssid);

    wifi.connect()?;
    wifi.wait_netif_up()?;
    info!(
        "WiFi connected, IP: {:?}",
        wifi.wifi().sta_netif().get_ip_info()?
    );

    Ok(())
}

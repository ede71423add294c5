//! Host simulator for the lock engine
//!
//! Plays the BLE transport from stdin: `!connect` and `!disconnect` fire
//! connection events, any other line is written to the command
//! characteristic. Notifications go to stdout as `TX: <text>`.

use std::convert::Infallible;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use log::{LevelFilter, info};
use smartlock_device::{DirStorage, Engine, EngineEvent, HttpIssuer, POLL_INTERVAL, config};
use smartlock_mcu::{ActuationSink, Banner, LockState, Notifier, TransportEvents};

/// SmartLock engine simulator
#[derive(Debug, Parser)]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Key storage directory (default: SMARTLOCK_HOME or ~/.smartlock)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Split each written line into packets of this many bytes
    #[arg(long)]
    chunk: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    type Error = Infallible;

    fn notify(&mut self, text: &str) -> Result<(), Self::Error> {
        println!("TX: {text}");
        Ok(())
    }
}

/// Prints what a display and solenoid would show
struct ConsoleIndicator;

impl ActuationSink for ConsoleIndicator {
    fn set_state(&mut self, state: LockState) {
        println!("[lock] {}", state.as_str());
    }

    fn show_banner(&mut self, banner: Banner) {
        println!("[display] {}", banner.as_str());
    }

    fn clear_banner(&mut self) {
        println!("[display] -");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("smartlock")
        .build();
    let _ = simplelog::SimpleLogger::init(args.log_level, log_config);

    let config = config::load(args.config.as_deref())?;
    let home = args
        .home
        .or_else(config::smartlock_home)
        .ok_or("cannot determine storage directory, pass --home")?;
    let storage = DirStorage::open(&home)?;
    info!("storage: {}", home.display());
    info!("issuer: {} room: {}", config.issuer_url, config.room);

    let mut engine = Engine::new(
        config,
        storage,
        HttpIssuer::new()?,
        ConsoleIndicator,
        StdoutNotifier,
    );
    let service_uuid = engine.resolve_service_uuid();
    info!("advertising service {} ({:?})", service_uuid.uuid, service_uuid.source);

    let handle = engine.handle();
    let chunk = args.chunk.filter(|&n| n > 0);
    let reader = thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "!connect" => handle.on_connect(),
                "!disconnect" => handle.on_disconnect(),
                _ => {
                    let mut data = line.into_bytes();
                    data.push(b'\n');
                    match chunk {
                        Some(size) => data.chunks(size).for_each(|c| handle.on_write(c)),
                        None => handle.on_write(&data),
                    }
                }
            }
        }
    });

    let handle = engine.handle();
    loop {
        let outcome = engine.poll();
        for event in outcome.events {
            if event == EngineEvent::ResumeAdvertising {
                info!("advertising resumed");
            }
        }
        if reader.is_finished() && handle.pending_tasks() == 0 {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}

//! Command line client for SmartLock devices

use clap::{Parser, Subcommand};
use log::LevelFilter;

use smartlock_ble::{ble, issuer};
use smartlock_proto::ble::DEFAULT_WRITE_CHUNK;

#[derive(Parser)]
#[command(name = "smartlock-ble")]
#[command(about = "BLE client for SmartLock devices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bytes per BLE write
    #[arg(long, global = true, default_value_t = DEFAULT_WRITE_CHUNK)]
    chunk: usize,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for SmartLock devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Lock a device
    Lock {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Unlock a device with the room's public key
    Unlock {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Base64 public key
        #[arg(long, conflicts_with = "issuer", required_unless_present = "issuer")]
        public_key: Option<String>,
        /// Key issuer base URL to fetch the public key from
        #[arg(long, requires = "room")]
        issuer: Option<String>,
        /// Room whose public key to fetch
        #[arg(long)]
        room: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _ = simplelog::SimpleLogger::init(cli.log_level, simplelog::Config::default());

    match cli.command {
        Commands::Scan { duration } => {
            println!("Scanning for SmartLock devices ({duration} seconds)...");
            let devices = ble::scan(duration).await?;

            println!("\nFound {} devices:", devices.len());
            for device in devices {
                let rssi = device
                    .rssi
                    .map(|r| format!("{r} dBm"))
                    .unwrap_or_else(|| "N/A".to_string());
                let marker = if device.is_lock { " [LOCK]" } else { "" };
                println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
            }
        }
        Commands::Lock { device } => {
            println!("Sending lock command...");
            let received = ble::lock(device.as_deref(), cli.chunk).await?;
            print_notifications(&received);
        }
        Commands::Unlock {
            device,
            public_key,
            issuer: issuer_url,
            room,
        } => {
            let public_key = match (public_key, issuer_url, room) {
                (Some(key), _, _) => key,
                (None, Some(url), Some(room)) => issuer::fetch_public_key(&url, &room).await?,
                _ => return Err("pass --public-key or --issuer with --room".into()),
            };

            println!("Sending unlock command...");
            let received = ble::unlock(device.as_deref(), &public_key, cli.chunk).await?;
            print_notifications(&received);
        }
    }

    Ok(())
}

fn print_notifications(received: &[String]) {
    if received.is_empty() {
        println!("No notifications received");
    }
    for text in received {
        println!("RX: {text}");
    }
}

use std::sync::Arc;

use log::LevelFilter;

#[derive(clap::Parser)]
#[command(name = "smartlock-issuer")]
#[command(about = "SmartLock key issuer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create the key of a room
    CreateKey {
        #[arg(long)]
        room: String,
    },
    /// Run the server
    Run {
        #[arg(long, default_value = "127.0.0.1:8081")]
        addr: String,
    },
}

#[tokio::main]
async fn main() {
    let cli: Cli = clap::Parser::parse();

    let _ = simplelog::SimpleLogger::init(cli.log_level, simplelog::Config::default());

    let Some(home) = smartlock_issuer::issuer_home() else {
        eprintln!("Could not determine home directory, set {}", smartlock_issuer::ENV_HOME);
        std::process::exit(1);
    };
    let keys = match smartlock_issuer::KeyDir::open(&home) {
        Ok(keys) => keys,
        Err(e) => {
            eprintln!("Failed to open key directory: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::CreateKey { room } => match keys.create(&room) {
            Ok(key) => {
                println!("Created key for room {}", key.room());
                println!("Public key: {}", key.public_key_base64());
            }
            Err(e) => {
                eprintln!("Failed to create key: {e}");
                std::process::exit(1);
            }
        },
        Commands::Run { addr } => {
            if let Err(e) = smartlock_issuer::http::run_server(&addr, Arc::new(keys)).await {
                eprintln!("Server failed on {addr}: {e}");
                std::process::exit(1);
            }
        }
    }
}

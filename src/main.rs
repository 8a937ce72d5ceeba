//! mcqbot - A Matrix bot to query and start a Minecraft server.
//!
//! This is the main entry point of the bot, which bridges Matrix rooms with a
//! Minecraft server through its status protocols.
//!
//! # Overview
//!
//! Room members type `mc!` commands to see who is online, to start the server
//! after a crash, or, for managers, to restrict the bot to a single room.
//!
//! # Configuration
//!
//! The bot reads a flat JSON file, `config.json` by default:
//!
//! ```json
//! {
//!   "token": "syt_matrix_access_token",
//!   "user_id": "@mcqbot:matrix.org",
//!   "device_id": "ABCDEFGHIJ",
//!   "server": "play.example.com",
//!   "port": 25565,
//!   "channel": "",
//!   "manager_level": 50
//! }
//! ```
//!
//! A missing file is generated from the defaults and the command line values.
//!
//! # Usage
//!
//! ```bash
//! mcqbot --generate --token syt_token --server play.example.com
//! mcqbot --config config.json --data ./mcqbot-data
//! ```
//!
//! # Bot Commands
//!
//! - `mc!query [host[:port]]` - List the online players with the full query protocol
//! - `mc!status [host[:port]]` - Same with the server list ping
//! - `mc!start-server` - Run `start.sh` if the server is offline
//! - `mc!help` - Display help information
//! - `mc!set-channel <room>` - Restrict the bot to a room, `~` to lift it (managers)
//! - `mc!exit` - Stop the bot (managers)
//!
//! # Architecture
//!
//! - [`bot`] - Wires Matrix events to the dispatcher
//! - [`commands`] - Command matching, handlers and response formatting
//! - [`config`] - JSON configuration store
//! - [`launcher`] - Start script probing and launching
//! - [`matrix`] - Matrix client integration
//! - [`status`] - Minecraft status protocols
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use tokio::sync::Mutex;

use crate::{
    bot::Bot,
    config::{ConfigError, ConfigOverrides, ConfigStore},
};

mod bot;
mod commands;
mod config;
mod launcher;
mod matrix;
mod status;

/// Command-line arguments of the bot.
///
/// Any of `--token`, `--server` and `--port` rewrites the configuration file
/// with the given values.
///
/// # Examples
///
/// ```bash
/// mcqbot -t syt_token -s play.example.com -p 25566
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Generate a new configuration file, discarding the existing one.
    #[arg(short, long)]
    generate: bool,

    /// Matrix access token of the bot account.
    #[arg(short, long)]
    token: Option<String>,

    /// Host of the default Minecraft server.
    #[arg(short, long)]
    server: Option<String>,

    /// Port of the default Minecraft server.
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the directory for storing persistent data.
    ///
    /// The Matrix store lives in its `session/` subdirectory. It contains the
    /// client state of the bot account, keep it private.
    #[arg(short, long, default_value = ".")]
    data: PathBuf,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            token: self.token.clone(),
            server: self.server.clone(),
            port: self.port,
        }
    }
}

/// Loads, generates or rewrites the configuration file.
///
/// - Missing file or `--generate`: defaults merged with the overrides
/// - Overrides given: existing file merged with the overrides
/// - Otherwise: existing file as is
async fn open_config_store(args: &Args) -> Result<ConfigStore, ConfigError> {
    let overrides = args.overrides();

    if args.generate {
        return ConfigStore::generate(&args.config, &overrides).await;
    }

    match ConfigStore::load(&args.config).await {
        Ok(mut store) => {
            if !overrides.is_empty() {
                store.apply_overrides(&overrides).await?;
            }
            Ok(store)
        }
        Err(ConfigError::Missing(path)) => {
            info!("no configuration at {}, generating one", path.display());
            ConfigStore::generate(&args.config, &overrides).await
        }
        Err(e) => Err(e),
    }
}

/// Main entry point of the bot.
///
/// 1. **Logging Setup**: `info` level by default, `RUST_LOG` overrides it
/// 2. **Argument Parsing**: `clap` exits with status 2 on invalid arguments
/// 3. **Configuration**: loaded or generated, an incomplete one prints a
///    message and exits with status 0
/// 4. **Bot Execution**: restores the Matrix session and syncs until `mc!exit`
#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting mcqbot {}...", env!("CARGO_PKG_VERSION"));

    // Parse command line arguments
    let args = Args::parse();

    let config_store = match open_config_store(&args).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config_store.check_complete() {
        println!(
            "{}. Fill it in {} and restart the bot.",
            e,
            args.config.display()
        );
        return;
    }

    // Launch bot
    let bot = match Bot::new(Arc::new(Mutex::new(config_store)), &args.data).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to initialize bot: {}", e);
            std::process::exit(1);
        }
    };
    bot.start().await;
}

//! Wireline CLI Entry Point
//!
//! Interactive terminal client for both transport variants: type a line to
//! send it, `/bye` to dispatch the goodbye event, `/quit` to disconnect.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wireline::connection::handle::entries_after;
use wireline::{
    Config, ConnectOptions, ConnectionHandle, EventTransport, LoggingConfig, SocketTransport,
    Transport,
};

#[derive(Parser)]
#[command(name = "wireline")]
#[command(author, version, about = "Wireline - realtime connection manager client")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect with the multiplexed-event client
    Events {
        /// Override the configured endpoint address
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Connect with the raw socket client
    Socket {
        /// Override the configured endpoint address
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Events { url } => {
            let address = url.unwrap_or_else(|| config.endpoint.event_url.clone());
            let options = config.connection.connect_options();

            let mut handle = ConnectionHandle::new(EventTransport::new());
            handle.on_state_change(|state| info!(state = %state, "Link state changed"));
            handle.connect(&address, options).await?;
            interact(handle, Some("notice")).await?;
        }
        Commands::Socket { url } => {
            let address = url.unwrap_or_else(|| config.socket_address());

            let mut handle = ConnectionHandle::new(SocketTransport::new(&config.user_id));
            handle.on_state_change(|state| info!(state = %state, "Link state changed"));
            handle.connect(&address, ConnectOptions::default()).await?;
            interact(handle, None).await?;
        }
        Commands::Init => {
            let config = Config::default_config();
            if let Some(parent) = cli.config.parent() {
                std::fs::create_dir_all(parent)?;
            }
            config.save(&cli.config)?;
            println!("Wrote default configuration to {}", cli.config.display());
        }
        Commands::Version => {
            println!("wireline {}", env!("CARGO_PKG_VERSION"));
            println!("Realtime connection manager client");
        }
    }

    Ok(())
}

/// Install the global subscriber per the logging section of the config;
/// `--verbose` overrides the configured level with DEBUG.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { logging.max_level() };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish())?,
        _ => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

/// Drive the handle until the caller quits or the transport gives up: pump
/// signals, echo new log entries, and forward stdin lines as messages.
async fn interact<T: Transport>(
    mut handle: ConnectionHandle<T>,
    channel: Option<&str>,
) -> Result<()> {
    println!("Type a message and press enter. /bye sends the goodbye event, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seen: u64 = 0;

    loop {
        tokio::select! {
            alive = handle.pump() => {
                seen = print_new_entries(&handle, seen);
                if !alive {
                    break;
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    handle.disconnect();
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line {
                    "/quit" => {
                        handle.disconnect();
                        break;
                    }
                    "/bye" => {
                        if let Err(e) = handle.emit("bye") {
                            warn!(error = %e, "Goodbye event not sent");
                        }
                        seen = print_new_entries(&handle, seen);
                    }
                    text => {
                        match handle.send(channel, text) {
                            Ok(_) => {
                                seen = print_new_entries(&handle, seen);
                            }
                            Err(e) if e.is_send_rejection() => {
                                // Precondition violation, surfaced to the
                                // caller; the message never left
                                warn!(error = %e, "Message not sent");
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
        }
    }

    print_new_entries(&handle, seen);
    info!(state = %handle.state(), entries = handle.log().len(), "Session ended");
    handle.dispose();
    Ok(())
}

fn print_new_entries<T: Transport>(handle: &ConnectionHandle<T>, seen: u64) -> u64 {
    let (entries, next) = entries_after(handle.log(), seen);
    for entry in entries {
        println!("[{}] {}: {}", entry.sequence, entry.direction, entry.payload);
    }
    next
}

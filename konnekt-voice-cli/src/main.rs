use clap::{Parser, Subcommand};
use konnekt_voice_cli::{envelope_schema, run_demo, CliError, DemoOptions, LogConfig, Result};
use konnekt_voice_signaling::{PeerId, RoomEvent};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "konnekt-voice")]
#[command(
    version,
    about = "Konnekt Voice CLI - signaling relay and peer-session coordinator for voice rooms"
)]
struct Cli {
    /// Debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated room over an in-process relay
    Demo {
        /// Number of participants
        #[arg(short = 'p', long, default_value_t = 3)]
        peers: usize,

        /// How many participants join without a microphone
        #[arg(short = 'l', long, default_value_t = 0)]
        listeners: usize,

        /// Room name
        #[arg(short = 'r', long, default_value = "general")]
        room: String,

        /// Validity window of each signal, in seconds
        #[arg(long, default_value_t = 60)]
        ttl: u64,

        /// Handshake timeout, in seconds
        #[arg(long, default_value_t = 30)]
        handshake_timeout: u64,

        /// Give up after this many seconds
        #[arg(short = 't', long, default_value_t = 10)]
        timeout: u64,

        /// Print room events and the final report as JSON
        #[arg(long)]
        json: bool,

        /// TURN server URL (optional, format: turn:host:port)
        #[arg(long)]
        turn_server: Option<String>,

        /// TURN username (required if turn-server is set)
        #[arg(long)]
        turn_username: Option<String>,

        /// TURN credential (required if turn-server is set)
        #[arg(long)]
        turn_credential: Option<String>,
    },

    /// Print the JSON schema of the signaling envelope
    Schema {
        /// Write to a file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::dev()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    let log_config = if cli.json_logs {
        log_config.with_json()
    } else {
        log_config
    };
    log_config.init()?;

    match cli.command {
        Commands::Demo {
            peers,
            listeners,
            room,
            ttl,
            handshake_timeout,
            timeout,
            json,
            turn_server,
            turn_username,
            turn_credential,
        } => {
            let options = DemoOptions {
                peers,
                listeners,
                room,
                signal_ttl: Duration::from_secs(ttl),
                handshake_timeout: Duration::from_secs(handshake_timeout),
                timeout: Duration::from_secs(timeout),
                turn_server,
                turn_username,
                turn_credential,
            };

            tokio::select! {
                result = demo(options, json) => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down...");
                }
            }
        }
        Commands::Schema { output } => {
            let schema = envelope_schema()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, schema)
                        .map_err(|e| CliError::schema_write(path.clone(), e))?;
                    info!("📄 Schema written to {}", path.display());
                }
                None => println!("{}", schema),
            }
        }
    }

    Ok(())
}

async fn demo(options: DemoOptions, json: bool) -> Result<()> {
    let timeout = options.timeout;
    let report = run_demo(&options, |peer, event| print_event(peer, event, json)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        for snapshot in &report.snapshots {
            let mic = if snapshot.microphone_enabled {
                "🎙️"
            } else {
                "🎧"
            };
            println!(
                "{} {}: {} peers connected",
                mic,
                snapshot.local_peer_id,
                snapshot.peer_count()
            );
        }
        println!("Room '{}' settled in {} ms", report.room, report.elapsed_ms);
    }

    if report.converged {
        Ok(())
    } else {
        Err(CliError::Timeout { waited: timeout })
    }
}

fn print_event(peer: &PeerId, event: &RoomEvent, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "at": peer, "room_event": event }));
        return;
    }

    match event {
        RoomEvent::MembershipAdded { peer: other } => println!("🟢 {} ⇄ {}", peer, other),
        RoomEvent::MembershipRemoved { peer: other } => println!("🔴 {} ✕ {}", peer, other),
        RoomEvent::SessionStateChanged { peer: other, state } => {
            println!("   {} → {}: {:?}", peer, other, state)
        }
    }
}

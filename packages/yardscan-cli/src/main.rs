//! Yardscan CLI - capture vehicle and location QR codes from a terminal
//!
//! This binary drives a capture session:
//! - Reads codes from a scanner device or a keyboard-wedge scanner
//! - Previews each decoded payload
//! - Submits the vehicle/location pair to the collection endpoint

mod input;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use yardscan_core::scan::{format_preview, parse_payload};
use yardscan_core::{cloud, CloudClient, DeviceScanner, Session, SessionEnd};

#[derive(Parser)]
#[command(name = "yardscan")]
#[command(author = "Yardscan Team")]
#[command(version)]
#[command(about = "Capture vehicle and location QR codes and submit them")]
#[command(long_about = "
Yardscan pairs a vehicle QR code with a location QR code and submits
both to the collection endpoint in one request.

Quick start:
  1. Start a session:   yardscan run
  2. Type 1, scan the vehicle code; type 2, scan the location code
  3. Type s to submit

With a serial scanner:  yardscan run --device /dev/ttyACM0
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an interactive capture session
    Run {
        /// Scanner device or file to read codes from (default: stdin as keyboard wedge)
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Override the endpoint base URL
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Show configuration paths and settings
    Config {
        /// Override the endpoint base URL
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Show the preview a scan of this payload would produce
    Preview {
        /// File holding the scanned text ("-" or omitted for stdin)
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("yardscan={},yardscan_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Run { device, endpoint } => {
            cmd_run(&cli, device.as_deref(), endpoint.as_deref()).await
        }
        Commands::Config { endpoint } => cmd_config(&cli, endpoint.as_deref()),
        Commands::Preview { input } => cmd_preview(&cli, input.as_deref()),
    }
}

async fn cmd_run(cli: &Cli, device: Option<&Path>, endpoint: Option<&str>) -> Result<()> {
    let endpoint = cloud::load_endpoint_config(endpoint);
    let client = CloudClient::new(&endpoint);
    let session = Session::new(client, terminal::TerminalNotifier::new(cli.format));

    tracing::info!(
        "Starting capture session {} (endpoint from {})",
        session.id(),
        endpoint.source
    );

    if let OutputFormat::Text = cli.format {
        println!(
            "{}",
            terminal::session_banner(&endpoint.submit_url(), device.is_none())
        );
    }

    let (end, state) = match device {
        Some(path) => {
            let user_events = input::spawn_stdin_reader(None);
            session.run(DeviceScanner::new(path), user_events).await
        }
        None => {
            let (wedge, camera) = input::WedgeCamera::channel();
            let user_events = input::spawn_stdin_reader(Some(wedge));
            session.run(camera, user_events).await
        }
    };

    if state.can_submit() {
        match cli.format {
            OutputFormat::Text => println!("Discarding unsubmitted scans."),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "discarded",
                        "scan_1": state.scan_a.is_some(),
                        "scan_2": state.scan_b.is_some(),
                    })
                );
            }
        }
    }

    match end {
        SessionEnd::PermissionRefused(status) => {
            anyhow::bail!("Camera permission {}, session not started", status)
        }
        SessionEnd::Quit | SessionEnd::InputClosed => Ok(()),
    }
}

fn cmd_config(cli: &Cli, endpoint: Option<&str>) -> Result<()> {
    let endpoint = cloud::load_endpoint_config(endpoint);
    let config_path = cloud::config::get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:   {}", config_path);
            println!("Endpoint:      {} (from {})", endpoint.base_url, endpoint.source);
            println!("Submit URL:    {}", endpoint.submit_url());
            println!();
            println!("Environment variables:");
            println!("  {} - Override endpoint base URL", cloud::config::ENV_ENDPOINT);
            println!("  RUST_LOG - Log filter (e.g. yardscan_core=debug)");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", cloud::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "base_url": endpoint.base_url,
                    "path": endpoint.path,
                    "submit_url": endpoint.submit_url(),
                    "source": endpoint.source.to_string(),
                })
            );
        }
    }

    Ok(())
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path)),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn cmd_preview(cli: &Cli, input: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let payload = parse_payload(text.trim()).context("Not a scannable payload")?;
    let preview = format_preview(&payload);

    match cli.format {
        OutputFormat::Text => {
            println!("Data Preview:");
            println!("{}", preview);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "keys": payload.len(),
                    "preview": preview.lines().collect::<Vec<_>>(),
                })
            );
        }
    }

    Ok(())
}

//! Safety Bus Smoke - signature tooling for the webhook gateway.
//!
//! ```bash
//! # Print the x-line-signature for a body
//! safetybus-smoke sign --body '{"events":[]}'
//!
//! # Check that a deployment accepts signed requests and rejects forged ones
//! safetybus-smoke probe --url https://gateway.example.com/webhook
//! ```
//!
//! The secret is taken from `--secret` or `LINE_CHANNEL_SECRET`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use safetybus::smoke::{SmokeClient, DEFAULT_BODY};
use safetybus::web::sign;

#[derive(Parser, Debug)]
#[command(name = "safetybus-smoke", about = "Sign and probe LINE webhook requests")]
struct Cli {
    /// LINE channel secret
    #[arg(long, env = "LINE_CHANNEL_SECRET", hide_env_values = true, global = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the signature for a body
    Sign {
        #[command(flatten)]
        body: BodyArgs,

        /// Prefix the output with `sha256=`
        #[arg(long)]
        prefixed: bool,
    },

    /// Send signed, tampered and unsigned requests to a webhook URL
    Probe {
        /// Full webhook URL
        #[arg(long)]
        url: String,

        #[command(flatten)]
        body: BodyArgs,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Args, Debug)]
struct BodyArgs {
    /// Request body, sent byte-for-byte
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    body_file: Option<PathBuf>,
}

impl BodyArgs {
    fn load(&self) -> Result<Vec<u8>> {
        match (&self.body, &self.body_file) {
            (Some(body), _) => Ok(body.as_bytes().to_vec()),
            (None, Some(path)) => std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, None) => Ok(DEFAULT_BODY.as_bytes().to_vec()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout carries only the command's output.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let secret = match cli.secret.as_deref() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => bail!("LINE_CHANNEL_SECRET is not set"),
    };

    match cli.command {
        Command::Sign { body, prefixed } => {
            let body = body.load()?;
            let signature = sign(secret.as_bytes(), &body);
            if prefixed {
                println!("sha256={}", signature);
            } else {
                println!("{}", signature);
            }
        }
        Command::Probe {
            url,
            body,
            timeout_secs,
        } => {
            let body = body.load()?;
            info!(url = %url, body_length = body.len(), "smoke_probe_starting");

            let client = SmokeClient::new(Duration::from_secs(timeout_secs))?;
            let report = client.run_probe(&url, &secret, &body).await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );

            if !report.passed() {
                bail!("Smoke probe failed against {}", url);
            }

            info!(url = %url, "smoke_probe_passed");
        }
    }

    Ok(())
}

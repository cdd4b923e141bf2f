//! Tracing setup.
//!
//! The full-screen UI owns the terminal, so logs go to a file under the data
//! directory. Plain mode writes to stderr instead, keeping stdout for session
//! output.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
}

fn env_filter(debug: bool) -> EnvFilter {
    let default_directive = if debug {
        "console=debug,console_session=debug,info"
    } else {
        "console=info,console_session=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber.
pub fn init(target: LogTarget<'_>, debug: bool) -> Result<()> {
    match target {
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(env_filter(debug))
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(())
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(env_filter(debug))
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(())
        }
    }
}

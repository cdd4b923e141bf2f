mod app;
mod config;
mod logging;
mod plain;
mod terminal;
mod view;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

use console_session::{ControllerConfig, Session, SessionConfig, TransportConfig};

use crate::config::{CliOverrides, ConsoleConfig, FileConfig, Settings};
use crate::logging::LogTarget;

#[derive(Parser)]
#[command(name = "console")]
#[command(about = "Interactive terminal for a remote console session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// WebSocket URL to connect to (skips derivation from --origin)
    #[arg(long, global = true)]
    url: Option<String>,

    /// http(s) origin serving the console; the endpoint is /ws on that host
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Custom data directory (defaults to ~/.console)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Delay between a lost connection and the next attempt
    #[arg(long, global = true)]
    reconnect_delay_ms: Option<u64>,

    /// Line mode: plain text on stdout, answers from stdin.
    /// Chosen automatically when stdin is not a terminal.
    #[arg(long)]
    plain: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved WebSocket endpoint and exit
    Endpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConsoleConfig::new(cli.data_dir.clone())?;
    let mut fc: FileConfig = config::load_config(&config.data_dir)
        .extract()
        .with_context(|| format!("Invalid configuration in {:?}", config.config_toml_path()))?;
    CliOverrides {
        url: cli.url.clone(),
        origin: cli.origin.clone(),
        reconnect_delay_ms: cli.reconnect_delay_ms,
    }
    .apply(&mut fc);
    let settings = Settings::from_file(&fc)?;

    match cli.command {
        Some(Commands::Endpoint) => {
            println!("{}", settings.url);
            Ok(())
        }
        None => {
            let plain = cli.plain || !std::io::stdin().is_terminal();
            run_session(&config, settings, plain, cli.debug).await
        }
    }
}

async fn run_session(config: &ConsoleConfig, settings: Settings, plain: bool, debug: bool) -> Result<()> {
    let log_path = config.session_log_path(chrono::Local::now());
    let target = if plain {
        LogTarget::Stderr
    } else {
        LogTarget::File(&log_path)
    };
    logging::init(target, debug)?;

    info!(
        url = %settings.url,
        user_agent = %settings.metadata.user_agent,
        language = %settings.metadata.language,
        plain,
        "Starting console session"
    );

    let mut transport = TransportConfig::new(settings.url.clone());
    transport.reconnect_delay = settings.reconnect_delay;
    let mut controller = ControllerConfig::new(settings.metadata.clone());
    controller.mask_char = settings.mask_char;

    let session = Session::start(SessionConfig {
        transport,
        controller,
    });

    if plain {
        return plain::run(session).await;
    }

    let mut terminal = ratatui::init();
    crate::terminal::enable_paste();
    let result = app::run(&mut terminal, session, &settings).await;
    crate::terminal::disable_paste();
    ratatui::restore();

    info!("Session ended");
    if result.is_err() {
        eprintln!("console: see {} for details", log_path.display());
    }
    result
}

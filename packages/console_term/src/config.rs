use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use console_session::input_line::DEFAULT_MASK_CHAR;
use console_session::{ClientMetadata, endpoint};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [connection]
//                    origin = "https://console.example.com"
//
//   env var:         CONSOLE_CONNECTION__ORIGIN=https://console.example.com
//
//   (double underscore = nesting, single underscore stays within field names)

pub const PRODUCT: &str = "console";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: ConnectionFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
    #[serde(default)]
    pub display: DisplayFileConfig,
}

/// Where to connect (lives under `[connection]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    /// Full `ws://` / `wss://` URL. Skips derivation from `origin`.
    #[serde(default)]
    pub url: Option<String>,
    /// The http(s) origin serving the console; the endpoint is `/ws` on it.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionFileConfig {
    fn default() -> Self {
        Self {
            url: None,
            origin: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// What the client reports in `init` (lives under `[client]`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Presentation knobs (lives under `[display]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayFileConfig {
    #[serde(default = "default_mask_char")]
    pub mask_char: char,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for DisplayFileConfig {
    fn default() -> Self {
        Self {
            mask_char: default_mask_char(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    console_session::transport::DEFAULT_RECONNECT_DELAY.as_millis() as u64
}
fn default_mask_char() -> char {
    DEFAULT_MASK_CHAR
}
fn default_tick_ms() -> u64 {
    250
}

/// Build a figment that layers: defaults → config.toml → CONSOLE_* env vars.
///
///   `CONSOLE_CONNECTION__RECONNECT_DELAY_MS=500`  →  `connection.reconnect_delay_ms = 500`
///   `CONSOLE_DISPLAY__MASK_CHAR=•`  →  `display.mask_char = '•'`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("CONSOLE_").split("__"))
}

/// Values given on the command line. They sit above every other layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub url: Option<String>,
    pub origin: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

impl CliOverrides {
    pub fn apply(&self, fc: &mut FileConfig) {
        if let Some(ref url) = self.url {
            fc.connection.url = Some(url.clone());
        }
        if let Some(ref origin) = self.origin {
            fc.connection.origin = Some(origin.clone());
        }
        if let Some(ms) = self.reconnect_delay_ms {
            fc.connection.reconnect_delay_ms = ms;
        }
    }
}

// =============================================================================
// Runtime settings (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug)]
pub struct Settings {
    pub url: String,
    pub reconnect_delay: Duration,
    pub metadata: ClientMetadata,
    pub mask_char: char,
    pub tick: Duration,
}

impl Settings {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let url = endpoint::resolve(fc.connection.url.as_deref(), fc.connection.origin.as_deref())
            .context("Failed to resolve console endpoint")?;

        if fc.connection.reconnect_delay_ms == 0 {
            bail!("connection.reconnect_delay_ms must be greater than zero");
        }
        if fc.display.mask_char.is_control() {
            bail!("display.mask_char must be a printable character");
        }

        let detected = ClientMetadata::detect(PRODUCT, env!("CARGO_PKG_VERSION"));
        let metadata = ClientMetadata {
            user_agent: fc
                .client
                .user_agent
                .clone()
                .unwrap_or(detected.user_agent),
            language: fc.client.language.clone().unwrap_or(detected.language),
        };

        Ok(Self {
            url: url.to_string(),
            reconnect_delay: Duration::from_millis(fc.connection.reconnect_delay_ms),
            metadata,
            mask_char: fc.display.mask_char,
            tick: Duration::from_millis(fc.display.tick_ms.max(10)),
        })
    }
}

// =============================================================================
// Directory layout (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ConsoleConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".console"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, logs_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// One log file per run, named after its start time.
    pub fn session_log_path(&self, started: chrono::DateTime<chrono::Local>) -> PathBuf {
        self.logs_dir
            .join(format!("console-{}.log", started.format("%Y%m%d-%H%M%S")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── FileConfig defaults ─────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let fc = FileConfig::default();
        assert!(fc.connection.url.is_none());
        assert!(fc.connection.origin.is_none());
        assert_eq!(fc.connection.reconnect_delay_ms, 3000);
        assert_eq!(fc.display.mask_char, '*');
        assert!(fc.client.language.is_none());
    }

    // ── Settings ────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_endpoint_is_local_server() {
        let settings = Settings::from_file(&FileConfig::default()).unwrap();
        assert_eq!(settings.url, "ws://localhost:8765/ws");
        assert_eq!(settings.reconnect_delay, Duration::from_secs(3));
        assert!(settings.metadata.user_agent.starts_with("console/"));
    }

    #[test]
    fn test_settings_origin_derives_wss() {
        let mut fc = FileConfig::default();
        fc.connection.origin = Some("https://console.example.com".to_string());
        let settings = Settings::from_file(&fc).unwrap();
        assert_eq!(settings.url, "wss://console.example.com/ws");
    }

    #[test]
    fn test_settings_client_overrides() {
        let mut fc = FileConfig::default();
        fc.client.user_agent = Some("Mozilla/5.0 (Macintosh)".to_string());
        fc.client.language = Some("zh-CN".to_string());
        let settings = Settings::from_file(&fc).unwrap();
        assert_eq!(settings.metadata.user_agent, "Mozilla/5.0 (Macintosh)");
        assert_eq!(settings.metadata.language, "zh-CN");
    }

    #[test]
    fn test_settings_rejects_bad_values() {
        let mut fc = FileConfig::default();
        fc.connection.reconnect_delay_ms = 0;
        assert!(Settings::from_file(&fc).is_err());

        let mut fc = FileConfig::default();
        fc.connection.url = Some("http://example.com/ws".to_string());
        assert!(Settings::from_file(&fc).is_err());

        let mut fc = FileConfig::default();
        fc.display.mask_char = '\n';
        assert!(Settings::from_file(&fc).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut fc = FileConfig::default();
        fc.connection.origin = Some("http://from-file".to_string());
        let cli = CliOverrides {
            origin: Some("https://from-cli".to_string()),
            reconnect_delay_ms: Some(500),
            ..Default::default()
        };
        cli.apply(&mut fc);
        assert_eq!(fc.connection.origin.as_deref(), Some("https://from-cli"));
        assert_eq!(fc.connection.reconnect_delay_ms, 500);
        assert!(fc.connection.url.is_none());
    }

    // ── ConsoleConfig ───────────────────────────────────────────────────

    #[test]
    fn test_console_config_with_custom_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::new(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.data_dir, tmp.path());
        assert!(config.logs_dir.is_dir());
        assert_eq!(config.config_toml_path(), tmp.path().join("config.toml"));
    }

    #[test]
    fn test_session_log_path_is_timestamped() {
        use chrono::TimeZone;
        let tmp = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::new(Some(tmp.path().to_path_buf())).unwrap();
        let started = chrono::Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .unwrap();
        assert_eq!(
            config.session_log_path(started),
            tmp.path().join("logs").join("console-20240309-140507.log")
        );
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert!(fc.connection.url.is_none());
        assert_eq!(fc.display.tick_ms, 250);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[connection]\norigin = \"https://console.example.com\"\nreconnect_delay_ms = 1000\n\n[display]\nmask_char = \"•\"\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(
            fc.connection.origin.as_deref(),
            Some("https://console.example.com")
        );
        assert_eq!(fc.connection.reconnect_delay_ms, 1000);
        assert_eq!(fc.display.mask_char, '•');
    }

    #[test]
    fn test_load_config_partial_section_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let written = toml::to_string(&toml::toml! {
            [client]
            language = "de-DE"
        })
        .unwrap();
        std::fs::write(tmp.path().join("config.toml"), written).unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.client.language.as_deref(), Some("de-DE"));
        assert!(fc.client.user_agent.is_none());
        assert_eq!(fc.connection.reconnect_delay_ms, 3000);
    }
}

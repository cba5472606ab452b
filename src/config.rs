use crate::error::ConfigError;
use crate::exchange::{AssetDescriptor, BASE_ASSET_SETTING, ExchangeConfig, RateEntry, SettingsSource};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "wallet_presence";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";
pub const DEFAULT_WINDOW_MATCH: &str = "(?i)wallet";

#[derive(Debug, Parser)]
#[command(name = "wallet_presence", version, about = "Window idle tracking and balance exchange for the wallet UI")]
pub struct Cli {
    /// Serve the wallet UI over WebSocket
    #[arg(long, conflicts_with = "native_host")]
    pub daemon: bool,

    /// Talk to the browser extension over native messaging (stdin/stdout)
    #[arg(long)]
    pub native_host: bool,

    /// WebSocket listen address (daemon mode)
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// Write JSON logs to this file instead of stderr
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Sleep steps until the dimming overlay is fully opaque (0 disables dimming)
    #[arg(long)]
    pub max_sleep: Option<u32>,

    /// Mirror balance poll interval in milliseconds
    #[arg(long)]
    pub interval: Option<String>,

    /// Convert once per balance change instead of polling
    #[arg(long)]
    pub no_update: bool,

    /// Mirror asset id (defaults to the baseAssetId setting)
    #[arg(long)]
    pub target_asset: Option<String>,

    /// Regex matched against the Hyprland window class and title
    #[arg(long, default_value = DEFAULT_WINDOW_MATCH)]
    pub window_match: String,
}

impl Cli {
    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig::from_bindings(
            self.interval.as_deref(),
            self.no_update,
            self.target_asset.clone(),
        )
    }

    /// CLI value first, then the settings file.
    pub fn max_sleep(&self, settings: &Settings) -> u32 {
        self.max_sleep.or(settings.max_sleep).unwrap_or(0)
    }
}

/// User settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub base_asset_id: Option<String>,
    #[serde(default)]
    pub max_sleep: Option<u32>,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
    #[serde(default)]
    pub rates: Vec<RateEntry>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("settings.json"))
    }

    /// Loads settings; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    event = "config.settings.not_found",
                    path = %path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings: Settings = serde_json::from_str(&content)?;
        tracing::info!(
            event = "config.settings.loaded",
            path = %path.display(),
            assets = settings.assets.len(),
            rates = settings.rates.len()
        );
        Ok(settings)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

impl SettingsSource for Settings {
    fn setting(&self, key: &str) -> Option<String> {
        if key == BASE_ASSET_SETTING {
            return self.base_asset_id.clone();
        }
        match self.extra.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::UpdateMode;
    use std::time::Duration;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "baseAssetId": "USD",
        "maxSleep": 6,
        "assets": [
            {"id": "WAVES", "name": "Waves", "precision": 8},
            {"id": "USD", "name": "US Dollar", "precision": 2}
        ],
        "rates": [{"from": "WAVES", "to": "USD", "rate": 1.25}],
        "theme": "dark",
        "lockTimeout": 30
    }"#;

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.base_asset_id.as_deref(), Some("USD"));
        assert_eq!(settings.max_sleep, Some(6));
        assert_eq!(settings.assets.len(), 2);
        assert_eq!(settings.rates[0].rate, 1.25);
    }

    #[test]
    fn test_setting_lookup_covers_extra_keys() {
        let settings: Settings = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(settings.setting("baseAssetId").as_deref(), Some("USD"));
        assert_eq!(settings.setting("theme").as_deref(), Some("dark"));
        assert_eq!(settings.setting("lockTimeout").as_deref(), Some("30"));
        assert_eq!(settings.setting("missing"), None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["wallet_presence"]);
        assert!(!cli.daemon);
        assert_eq!(cli.listen, DEFAULT_LISTEN_ADDR);
        assert_eq!(cli.exchange_config().mode, UpdateMode::Poll(Duration::from_millis(5000)));
    }

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "wallet_presence",
            "--daemon",
            "--max-sleep",
            "3",
            "--no-update",
            "--target-asset",
            "EUR",
        ]);
        let settings = Settings {
            max_sleep: Some(6),
            ..Settings::default()
        };
        assert_eq!(cli.max_sleep(&settings), 3);
        let config = cli.exchange_config();
        assert_eq!(config.mode, UpdateMode::Once);
        assert_eq!(config.target_asset_id.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_daemon_and_native_host_conflict() {
        assert!(Cli::try_parse_from(["wallet_presence", "--daemon", "--native-host"]).is_err());
    }
}

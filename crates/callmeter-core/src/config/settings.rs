use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::DEFAULT_CURRENCY_LABEL;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Per-minute wallet metering for consultation sessions")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the wallet storage
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Subcommand (defaults to `session`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Inspect or overwrite the stored wallet
    Wallet {
        #[command(subcommand)]
        action: WalletCommand,
    },
    /// Join a live metered session against the stored wallet
    Session {
        /// Rate in minor units per minute
        #[arg(short, long)]
        rate: Option<u64>,

        /// Length of one metered second in milliseconds
        #[arg(short = 'i', long)]
        tick_interval: Option<u64>,

        /// Debit the wallet with the session charge when it ends
        #[arg(long)]
        settle: bool,
    },
}

/// Wallet subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WalletCommand {
    /// Print the stored balance
    Show {
        /// Print the raw wallet record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite the stored balance (minor units)
    Set { balance: u64 },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if running a live session (the default when no subcommand is given)
    pub fn is_session_mode(&self) -> bool {
        matches!(self.command, None | Some(Command::Session { .. }))
    }

    /// Whether the session should settle the wallet on exit
    pub fn settle_on_exit(&self) -> bool {
        matches!(self.command, Some(Command::Session { settle: true, .. }))
    }

    /// Get the wallet subcommand, if any
    pub fn wallet_command(&self) -> Option<&WalletCommand> {
        match &self.command {
            Some(Command::Wallet { action }) => Some(action),
            _ => None,
        }
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Metering settings
    #[serde(default)]
    pub meter: MeterSettings,

    /// Wallet storage settings
    #[serde(default)]
    pub wallet: WalletSettings,
}

/// Metering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterSettings {
    /// Session rate in minor currency units per minute
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: u64,

    /// Length of one metered second in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_rate_per_minute() -> u64 {
    199
}

fn default_tick_interval() -> u64 {
    1000
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            rate_per_minute: default_rate_per_minute(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl MeterSettings {
    /// Tick period as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Wallet storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Storage directory (defaults to `<data dir>/callmeter`)
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Label shown next to balances
    #[serde(default = "default_currency_label")]
    pub currency_label: String,
}

fn default_currency_label() -> String {
    DEFAULT_CURRENCY_LABEL.to_string()
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            storage_dir: None,
            currency_label: default_currency_label(),
        }
    }
}

impl WalletSettings {
    /// Resolve the storage directory, falling back to the platform data dir
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("callmeter")))
            .unwrap_or_else(|| PathBuf::from(".callmeter"))
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return read_settings_file(p);
            }
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("callmeter/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/callmeter/config.toml")),
            dirs::home_dir().map(|p| p.join(".callmeter.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return read_settings_file(path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(dir) = &cli.storage_dir {
            self.wallet.storage_dir = Some(dir.clone());
        }
        if let Some(Command::Session {
            rate,
            tick_interval,
            ..
        }) = &cli.command
        {
            if let Some(rate) = rate {
                self.meter.rate_per_minute = *rate;
            }
            if let Some(tick_interval) = tick_interval {
                self.meter.tick_interval_ms = *tick_interval;
            }
        }
    }

    /// Validate and normalize settings values
    ///
    /// Rate and tick interval are clamped to a minimum of 1.
    pub fn validate(&mut self) {
        const MIN_TICK_INTERVAL: u64 = 1;
        const MIN_RATE: u64 = 1;

        if self.meter.tick_interval_ms < MIN_TICK_INTERVAL {
            self.meter.tick_interval_ms = MIN_TICK_INTERVAL;
        }
        if self.meter.rate_per_minute < MIN_RATE {
            self.meter.rate_per_minute = MIN_RATE;
        }
    }
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.meter.rate_per_minute, 199);
        assert_eq!(settings.meter.tick_interval_ms, 1000);
        assert_eq!(settings.meter.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.wallet.currency_label, "credits");
        assert!(settings.wallet.storage_dir.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [meter]
            rate_per_minute = 300

            [wallet]
            storage_dir = "/tmp/callmeter-test"
            currency_label = "USD cents"
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.meter.rate_per_minute, 300);
        assert_eq!(settings.meter.tick_interval_ms, 1000);
        assert_eq!(
            settings.wallet.resolved_storage_dir(),
            PathBuf::from("/tmp/callmeter-test")
        );
        assert_eq!(settings.wallet.currency_label, "USD cents");
    }

    #[test]
    fn test_merge_cli_session_overrides() {
        let cli = Config::try_parse_from([
            "callmeter",
            "--storage-dir",
            "/tmp/wallets",
            "session",
            "--rate",
            "60",
            "-i",
            "10",
            "--settle",
        ])
        .unwrap();

        let mut settings = Settings::default();
        settings.merge_cli(&cli);

        assert_eq!(settings.meter.rate_per_minute, 60);
        assert_eq!(settings.meter.tick_interval_ms, 10);
        assert_eq!(
            settings.wallet.storage_dir,
            Some(PathBuf::from("/tmp/wallets"))
        );
        assert!(cli.is_session_mode());
        assert!(cli.settle_on_exit());
    }

    #[test]
    fn test_default_command_is_session() {
        let cli = Config::try_parse_from(["callmeter"]).unwrap();
        assert!(cli.is_session_mode());
        assert!(!cli.settle_on_exit());
        assert!(cli.wallet_command().is_none());
    }

    #[test]
    fn test_wallet_subcommand() {
        let cli = Config::try_parse_from(["callmeter", "wallet", "set", "500"]).unwrap();
        assert!(!cli.is_session_mode());
        assert_eq!(
            cli.wallet_command(),
            Some(&WalletCommand::Set { balance: 500 })
        );
    }

    #[test]
    fn test_validate_clamps_zero_values() {
        let mut settings = Settings::default();
        settings.meter.rate_per_minute = 0;
        settings.meter.tick_interval_ms = 0;
        settings.validate();
        assert_eq!(settings.meter.rate_per_minute, 1);
        assert_eq!(settings.meter.tick_interval_ms, 1);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[meter]\ntick_interval_ms = 50\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.meter.tick_interval_ms, 50);
        assert_eq!(settings.meter.rate_per_minute, 199);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[meter\nrate_per_minute = ").unwrap();

        assert!(Settings::load(Some(&path)).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_from_xdg_config_home() {
        let config_home = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(config_home.path().join("callmeter")).unwrap();
        std::fs::write(
            config_home.path().join("callmeter/config.toml"),
            "[meter]\nrate_per_minute = 42\n",
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some(config_home.path().as_os_str())),
                ("HOME", Some(home.path().as_os_str())),
            ],
            || {
                let settings = Settings::load(None).unwrap();
                assert_eq!(settings.meter.rate_per_minute, 42);
            },
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_without_any_file_uses_defaults() {
        let config_home = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();

        temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some(config_home.path().as_os_str())),
                ("HOME", Some(home.path().as_os_str())),
            ],
            || {
                let settings = Settings::load(None).unwrap();
                assert_eq!(settings.meter.rate_per_minute, 199);
            },
        );
    }
}

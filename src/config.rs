//! Configuration loading and validation.
//!
//! Settings come from a `config.toml` file plus `VALWATCH__<SECTION>__<KEY>`
//! environment overrides. Without an explicit path the file is searched for
//! in `.`, `..`, `~/.solana-mc/config/` and `$CONFIG_PATH`, in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::alert::AlertWindowConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or validating configuration. All of them are
/// fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no config.toml found in {}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid alert time {value:?}, expected a time like \"10:00AM\"")]
    AlertTime { value: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoints {
    #[serde(default)]
    pub rpc_endpoint: String,
    #[serde(default)]
    pub network_rpc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorDetails {
    #[serde(default)]
    pub validator_name: String,
    #[serde(default)]
    pub pub_key: String,
    #[serde(default)]
    pub vote_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnableAlerts {
    #[serde(default)]
    pub enable_telegram_alerts: bool,
    #[serde(default)]
    pub enable_email_alerts: bool,
    #[serde(default)]
    pub enable_slack_alerts: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegularStatusAlerts {
    #[serde(default)]
    pub alert_timings: Vec<String>,
}

/// Per-alert toggles, written as `"yes"` / `"no"` in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AlerterPreferences {
    #[serde(default = "yes")]
    pub node_status_alerts: String,
    #[serde(default = "yes")]
    pub delinquency_alerts: String,
    #[serde(default = "no")]
    pub new_epoch_alerts: String,
}

impl Default for AlerterPreferences {
    fn default() -> Self {
        Self {
            node_status_alerts: yes(),
            delinquency_alerts: yes(),
            new_epoch_alerts: no(),
        }
    }
}

impl AlerterPreferences {
    pub fn node_status(&self) -> bool {
        is_yes(&self.node_status_alerts)
    }

    pub fn delinquency(&self) -> bool {
        is_yes(&self.delinquency_alerts)
    }

    pub fn new_epoch(&self) -> bool {
        is_yes(&self.new_epoch_alerts)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scraper {
    /// Interval between collection cycles, e.g. `"5s"`.
    #[serde(default = "default_rate")]
    pub rate: String,
    /// Upper bound on each upstream call.
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for Scraper {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Telegram {
    #[serde(default)]
    pub tg_bot_token: String,
    #[serde(default)]
    pub tg_chat_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendGrid {
    #[serde(default)]
    pub sendgrid_token: String,
    #[serde(default)]
    pub receiver_email_address: String,
    #[serde(default)]
    pub account_email: String,
    #[serde(default)]
    pub sendgrid_account_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slack {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prometheus {
    #[serde(default)]
    pub listen_address: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for Prometheus {
    fn default() -> Self {
        Self {
            listen_address: String::new(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Complete application settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub rpc_and_lcd_endpoints: Endpoints,
    #[serde(default)]
    pub validator_details: ValidatorDetails,
    #[serde(default)]
    pub enable_alerts: EnableAlerts,
    #[serde(default)]
    pub regular_status_alerts: RegularStatusAlerts,
    #[serde(default)]
    pub alerter_preferences: AlerterPreferences,
    #[serde(default)]
    pub scraper: Scraper,
    #[serde(default)]
    pub telegram: Telegram,
    #[serde(default)]
    pub sendgrid: SendGrid,
    #[serde(default)]
    pub slack: Slack,
    #[serde(default)]
    pub prometheus: Prometheus,
}

impl Settings {
    /// Load from `path`, or from the first `config.toml` on the search path
    /// when `path` is `None`, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => locate(&search_dirs())?,
        };
        let settings = Self::from_file(&path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a file and apply environment overrides without validating.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("VALWATCH").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Check required fields, channel credentials and every time-valued
    /// setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("rpc_and_lcd_endpoints.rpc_endpoint", &self.rpc_and_lcd_endpoints.rpc_endpoint)?;
        require("rpc_and_lcd_endpoints.network_rpc", &self.rpc_and_lcd_endpoints.network_rpc)?;
        require("validator_details.pub_key", &self.validator_details.pub_key)?;
        require("validator_details.vote_key", &self.validator_details.vote_key)?;
        require("prometheus.listen_address", &self.prometheus.listen_address)?;

        if !self.prometheus.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "prometheus.metrics_path",
                reason: "must start with '/'".to_string(),
            });
        }

        if self.enable_alerts.enable_telegram_alerts {
            require("telegram.tg_bot_token", &self.telegram.tg_bot_token)?;
            if self.telegram.tg_chat_id == 0 {
                return Err(ConfigError::Invalid {
                    field: "telegram.tg_chat_id",
                    reason: "required when telegram alerts are enabled".to_string(),
                });
            }
        }
        if self.enable_alerts.enable_email_alerts {
            require("sendgrid.sendgrid_token", &self.sendgrid.sendgrid_token)?;
            require("sendgrid.receiver_email_address", &self.sendgrid.receiver_email_address)?;
            require("sendgrid.account_email", &self.sendgrid.account_email)?;
        }
        if self.enable_alerts.enable_slack_alerts {
            require("slack.webhook_url", &self.slack.webhook_url)?;
        }

        self.rate()?;
        self.timeout()?;
        self.alert_windows()?;
        Ok(())
    }

    /// Interval between collection cycles.
    pub fn rate(&self) -> Result<Duration, ConfigError> {
        positive_duration("scraper.rate", &self.scraper.rate)
    }

    /// Per-call upstream timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        positive_duration("scraper.timeout", &self.scraper.timeout)
    }

    pub fn alert_windows(&self) -> Result<AlertWindowConfig, ConfigError> {
        AlertWindowConfig::parse(&self.regular_status_alerts.alert_timings)
    }
}

/// Directories searched for `config.toml`, in priority order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("."), PathBuf::from("..")];
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join(".solana-mc").join("config"));
    }
    if let Some(env_path) = std::env::var_os("CONFIG_PATH") {
        if !env_path.is_empty() {
            dirs.push(PathBuf::from(env_path));
        }
    }
    dirs
}

/// First `config.toml` found in `dirs`.
pub fn locate(dirs: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    let searched: Vec<PathBuf> = dirs.iter().map(|d| d.join(CONFIG_FILE_NAME)).collect();
    searched
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(ConfigError::NotFound { searched })
}

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "5s", "1.5s", "500ms", "2m"
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse().ok()?;
            if !val.is_finite() || val < 0.0 {
                return None;
            }
            return Some(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    None
}

fn positive_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        }),
        None => Err(ConfigError::Invalid {
            field,
            reason: format!("cannot parse duration {:?}", value),
        }),
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn is_yes(flag: &str) -> bool {
    flag.trim().eq_ignore_ascii_case("yes")
}

fn yes() -> String {
    "yes".to_string()
}

fn no() -> String {
    "no".to_string()
}

fn default_rate() -> String {
    "5s".to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[rpc_and_lcd_endpoints]
rpc_endpoint = "http://localhost:8899"
network_rpc = "https://api.mainnet-beta.solana.com"

[validator_details]
validator_name = "my-validator"
pub_key = "NodeKey111"
vote_key = "VoteKey111"

[regular_status_alerts]
alert_timings = ["10:00AM", "3:04PM"]

[prometheus]
listen_address = "127.0.0.1:9090"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal() {
        let file = write_config(MINIMAL);
        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.validator_details.pub_key, "NodeKey111");
        assert_eq!(settings.prometheus.metrics_path, "/metrics");
        assert_eq!(settings.rate().unwrap(), Duration::from_secs(5));
        assert!(settings.alerter_preferences.node_status());
        assert!(!settings.alerter_preferences.new_epoch());
        assert_eq!(settings.alert_windows().unwrap().len(), 2);
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.alert_windows().unwrap().len(), 3);
        assert_eq!(settings.prometheus.listen_address, "0.0.0.0:9090");
    }

    #[test]
    fn test_missing_pub_key_is_rejected() {
        let file = write_config(&MINIMAL.replace("pub_key = \"NodeKey111\"", ""));
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "validator_details.pub_key", .. }
        ));
    }

    #[test]
    fn test_enabled_channel_requires_credentials() {
        let contents = format!("{MINIMAL}\n[enable_alerts]\nenable_slack_alerts = true\n");
        let file = write_config(&contents);
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "slack.webhook_url", .. }));

        let contents = format!("{contents}\n[slack]\nwebhook_url = \"https://hooks.slack.com/x\"\n");
        let file = write_config(&contents);
        assert!(Settings::load(Some(file.path())).is_ok());
    }

    #[test]
    fn test_malformed_alert_time_is_fatal() {
        let file = write_config(&MINIMAL.replace("3:04PM", "25:00XM"));
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::AlertTime { .. }));
    }

    #[test]
    fn test_bad_rate_is_rejected() {
        let contents = format!("{MINIMAL}\n[scraper]\nrate = \"soon\"\n");
        let file = write_config(&contents);
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "scraper.rate", .. }));
    }

    #[test]
    fn test_locate_uses_first_match() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(locate(&dirs).unwrap(), second.path().join(CONFIG_FILE_NAME));

        std::fs::write(first.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();
        assert_eq!(locate(&dirs).unwrap(), first.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_locate_reports_searched_paths() {
        let empty = tempfile::tempdir().unwrap();
        let err = locate(&[empty.path().to_path_buf()]).unwrap_err();
        match err {
            ConfigError::NotFound { searched } => assert_eq!(searched.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_seconds() {
        let d = parse_duration("29.992671083s").unwrap();
        assert!((d.as_secs_f64() - 29.992671083).abs() < 0.0001);
    }

    #[test]
    fn test_parse_milliseconds() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("10"), None);
    }

    #[test]
    fn test_yes_no_flags() {
        assert!(is_yes("yes"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("no"));
        assert!(!is_yes(""));
    }
}

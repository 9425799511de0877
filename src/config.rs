//! Configuration management for the ipmi_fand daemon.
//!
//! Loads the controller address, credentials, loop timing and the two fan
//! group definitions from a YAML file. Files with a `.json` extension are
//! parsed as JSON.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::FanControlError,
    group::GroupController,
    tier::UnmatchedPolicy,
};

/// Main configuration structure for the ipmi_fand daemon.
///
/// # Example
///
/// ```yaml
/// address: 192.168.1.20
/// password: secret
/// trigger_interval: 5
///
/// cpu_fan_cfg:
///   enable: true
///   fan_list: [FAN1, FAN2]
///   temp_watch_list:
///     - sensor_regex: "CPU.*Temp"
///       temp_threshold: [40, 46, 52, 58]
///   rpm_ratio: [30, 45, 60, 75, 100]
///
/// board_fan_cfg:
///   enable: false
///   rpm_ratio: [30]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Management controller host name or IP address.
    #[serde(default)]
    pub address: String,

    /// RMCP port of the management controller.
    #[serde(default = "defaults::port")]
    pub port: u16,

    #[serde(default = "defaults::username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// ipmitool interface used to reach the controller.
    #[serde(default)]
    pub interface_type: InterfaceType,

    /// Optional IPMB target address (for example `0x20`).
    #[serde(default, alias = "ipmb_address")]
    pub target_address: Option<u8>,

    /// Seconds between control ticks.
    #[serde(default = "defaults::trigger_interval")]
    pub trigger_interval: u64,

    /// Sensor read attempts per tick before the tick is skipped.
    #[serde(default = "defaults::sensor_retries")]
    pub sensor_retries: u32,

    /// Delay between sensor read attempts, in milliseconds.
    #[serde(default = "defaults::retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Consecutive skipped ticks tolerated before the loop stops.
    #[serde(default)]
    pub max_failed_ticks: u32,

    /// Upper bound for a single management controller call, in seconds.
    #[serde(default = "defaults::command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Lowest duty the hardware adapter will send.
    #[serde(default = "defaults::min_duty")]
    pub min_duty: u8,

    /// Log fan commands instead of sending them.
    #[serde(default)]
    pub dry_run: bool,

    pub cpu_fan_cfg: FanGroupCfg,

    pub board_fan_cfg: FanGroupCfg,
}

/// ipmitool `-I` interface variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    #[default]
    Lan,
    Lanplus,
    /// Local `/dev/ipmi0`; address and credentials are ignored.
    Open,
}

impl InterfaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lan => "lan",
            Self::Lanplus => "lanplus",
            Self::Open => "open",
        }
    }

    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// One fan group: enable flag, watch rules and the tier-to-duty table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanGroupCfg {
    pub enable: bool,

    /// Fans belonging to the group. Informational only.
    #[serde(default)]
    pub fan_list: Vec<String>,

    #[serde(default)]
    pub temp_watch_list: Vec<WatchCfg>,

    /// Duty percentages, one more entry than each rule's thresholds.
    /// Fractions are truncated when the table is built.
    pub rpm_ratio: Vec<f64>,

    /// Behaviour when a watch pattern matches no sensor.
    #[serde(default)]
    pub on_unmatched: UnmatchedPolicy,
}

/// Sensor pattern paired with ascending temperature thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchCfg {
    pub sensor_regex: String,
    pub temp_threshold: Vec<f64>,
}

/// Group name the CPU fan configuration is addressed by.
pub const CPU_GROUP: &str = "cpu";
/// Group name the board/chassis fan configuration is addressed by.
pub const BOARD_GROUP: &str = "board";

impl Config {
    /// Checks loop settings and compiles both fan groups.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.trigger_interval == 0 {
            return Err(FanControlError::config("trigger_interval must be at least 1 second"));
        }
        if self.sensor_retries == 0 {
            return Err(FanControlError::config("sensor_retries must be at least 1"));
        }
        if self.command_timeout_secs == 0 {
            return Err(FanControlError::config("command_timeout_secs must be at least 1"));
        }
        if self.min_duty > 100 {
            return Err(FanControlError::config(format!(
                "min_duty {} is outside 0-100",
                self.min_duty
            )));
        }
        if self.interface_type.is_remote() && self.address.trim().is_empty() {
            return Err(FanControlError::config(format!(
                "address is required for the {} interface",
                self.interface_type.as_str()
            )));
        }

        self.fan_groups().map(|_| ())
    }

    /// Builds a controller for each fan group in fixed order: CPU, then board.
    pub fn fan_groups(&self) -> crate::error::Result<Vec<GroupController>> {
        Ok(vec![
            GroupController::from_cfg(CPU_GROUP, &self.cpu_fan_cfg)?,
            GroupController::from_cfg(BOARD_GROUP, &self.board_fan_cfg)?,
        ])
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.trigger_interval)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

mod defaults {
    pub fn port() -> u16 {
        623
    }

    pub fn username() -> String {
        "ADMIN".to_string()
    }

    pub fn trigger_interval() -> u64 {
        5
    }

    pub fn sensor_retries() -> u32 {
        3
    }

    pub fn retry_backoff_ms() -> u64 {
        1000
    }

    pub fn command_timeout_secs() -> u64 {
        10
    }

    /// Hardware floor; slower settings are raised to this.
    pub fn min_duty() -> u8 {
        30
    }
}

fn locate_config() -> Result<PathBuf> {
    if let Ok(env_path) = env::var("IPMI_FAND_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("ipmi_fand/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    let etc = Path::new("/etc/ipmi_fand/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Loads configuration from `path` or the standard locations.
///
/// Searches in order:
/// 1. Provided path parameter
/// 2. IPMI_FAND_CONFIG environment variable
/// 3. XDG_CONFIG_HOME/ipmi_fand/config.yml or ~/.config/ipmi_fand/config.yml
/// 4. /etc/ipmi_fand/config.yml
pub fn load(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p,
        None => locate_config().context("No configuration file found")?,
    };

    info!("Reading configuration from {}", config_path.display());
    load_from_path(&config_path)
}

/// Reads, parses and validates a configuration file.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<Config>(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<Config>(&content).map_err(|e| e.to_string())
    };
    let config = parsed
        .map_err(FanControlError::Configuration)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_temp_config(content: &str, suffix: &str) -> NamedTempFile {
        let mut temp_file = Builder::new().suffix(suffix).tempfile().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    fn group(enable: bool, thresholds: Vec<f64>, ratio: Vec<f64>) -> FanGroupCfg {
        FanGroupCfg {
            enable,
            fan_list: vec!["FAN1".to_string()],
            temp_watch_list: vec![WatchCfg {
                sensor_regex: "CPU.*Temp".to_string(),
                temp_threshold: thresholds,
            }],
            rpm_ratio: ratio,
            on_unmatched: UnmatchedPolicy::Ignore,
        }
    }

    fn config() -> Config {
        Config {
            address: "10.0.0.2".to_string(),
            port: 623,
            username: "ADMIN".to_string(),
            password: "secret".to_string(),
            interface_type: InterfaceType::Lan,
            target_address: None,
            trigger_interval: 5,
            sensor_retries: 3,
            retry_backoff_ms: 1000,
            max_failed_ticks: 0,
            command_timeout_secs: 10,
            min_duty: 30,
            dry_run: false,
            cpu_fan_cfg: group(true, vec![40.0, 46.0, 52.0, 58.0], vec![30.0, 45.0, 60.0, 75.0, 100.0]),
            board_fan_cfg: group(false, vec![50.0], vec![30.0, 60.0]),
        }
    }

    #[test]
    fn load_yaml_with_defaults() {
        let yaml = r#"
address: 192.168.1.20
password: secret
cpu_fan_cfg:
  enable: true
  fan_list: [FAN1, FAN2]
  temp_watch_list:
    - sensor_regex: "CPU.*Temp"
      temp_threshold: [40, 46, 52, 58]
  rpm_ratio: [30, 45, 60, 75, 100]
board_fan_cfg:
  enable: true
  temp_watch_list:
    - sensor_regex: "PCH Temp"
      temp_threshold: [50, 60]
  rpm_ratio: [30, 50, 80]
  on_unmatched: max_tier
"#;
        let file = create_temp_config(yaml, ".yml");
        let config = load(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.port, 623);
        assert_eq!(config.username, "ADMIN");
        assert_eq!(config.interface_type, InterfaceType::Lan);
        assert_eq!(config.trigger_interval, 5);
        assert_eq!(config.sensor_retries, 3);
        assert_eq!(config.min_duty, 30);
        assert_eq!(config.cpu_fan_cfg.fan_list, vec!["FAN1", "FAN2"]);
        assert_eq!(config.board_fan_cfg.on_unmatched, UnmatchedPolicy::MaxTier);
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
    }

    #[test]
    fn load_json_config() {
        let json = r#"{
  "address": "192.168.1.20",
  "password": "secret",
  "interface_type": "lanplus",
  "trigger_interval": 3,
  "cpu_fan_cfg": {
    "enable": true,
    "fan_list": ["FAN1"],
    "temp_watch_list": [{"sensor_regex": "CPU", "temp_threshold": [40, 50]}],
    "rpm_ratio": [30, 60, 100]
  },
  "board_fan_cfg": {
    "enable": false,
    "fan_list": [],
    "temp_watch_list": [],
    "rpm_ratio": [30]
  }
}"#;
        let file = create_temp_config(json, ".json");
        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.interface_type, InterfaceType::Lanplus);
        assert_eq!(config.trigger_interval, 3);
        assert!(!config.board_fan_cfg.enable);
    }

    #[test]
    fn load_json_with_ipmb_address_and_float_ratios() {
        let json = r#"{
  "address": "192.168.1.20",
  "ipmb_address": 44,
  "cpu_fan_cfg": {
    "enable": true,
    "fan_list": ["FAN1", "FAN2"],
    "temp_watch_list": [{"sensor_regex": "CPU", "temp_threshold": [45.0, 60.0]}],
    "rpm_ratio": [30.0, 60.0, 100.0]
  },
  "board_fan_cfg": {
    "enable": true,
    "fan_list": ["FANA"],
    "temp_watch_list": [{"sensor_regex": "PCH", "temp_threshold": [50.0]}],
    "rpm_ratio": [30.0, 55.5]
  }
}"#;
        let file = create_temp_config(json, ".json");
        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.target_address, Some(44));
        assert_eq!(config.cpu_fan_cfg.rpm_ratio, vec![30.0, 60.0, 100.0]);

        let groups = config.fan_groups().unwrap();
        let hot = [crate::sensors::SensorReading::new("PCH Temp", 70.0)];
        assert_eq!(groups[1].target_duty(&hot).unwrap(), 55);
    }

    #[test]
    fn invalid_file_reports_configuration_error() {
        let file = create_temp_config("address: [unclosed", ".yml");
        let err = load_from_path(file.path()).unwrap_err();
        let root = err.downcast_ref::<FanControlError>().unwrap();
        assert_eq!(root.kind(), "ConfigurationError");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_ratio_length_mismatch() {
        let mut cfg = config();
        cfg.cpu_fan_cfg.rpm_ratio = vec![30.0, 60.0];
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("rpm_ratio"));
    }

    #[test]
    fn validate_checks_disabled_groups_too() {
        let mut cfg = config();
        cfg.board_fan_cfg.temp_watch_list[0].sensor_regex = "PCH(".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut cfg = config();
        cfg.trigger_interval = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_address_for_remote_interface() {
        let mut cfg = config();
        cfg.address = String::new();
        assert!(cfg.validate().is_err());

        cfg.interface_type = InterfaceType::Open;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn fan_groups_keep_fixed_order() {
        let groups = config().fan_groups().unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec![CPU_GROUP, BOARD_GROUP]);
    }
}

use crate::error::{NodeError, Result};
use crate::paths;
use crate::types::{Address, MinipoolStatus};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Owner account. Resolved through the API at start-up when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub key: Option<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Replaces the `docker exec <container> <binary> api` prefix entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshConfig>,
}

fn default_container() -> String {
    "rocketpool_api".to_string()
}

fn default_binary() -> String {
    "/go/bin/rocketpool".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            binary: default_binary(),
            command: None,
            ssh: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TasksConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_target_status")]
    pub target_status: MinipoolStatus,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_target_status() -> MinipoolStatus {
    MinipoolStatus::Prelaunch
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            target_status: default_target_status(),
        }
    }
}

impl TaskConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub stake_prelaunch: TaskConfig,
}

// ---------------------------------------------------------------------------
// ReadinessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Block until ready. When false, a node that is not ready fails the cycle.
    #[serde(default = "default_wait")]
    pub wait: bool,
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

fn default_wait() -> bool {
    true
}

fn default_retry_secs() -> u64 {
    15
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            wait: default_wait(),
            retry_secs: default_retry_secs(),
        }
    }
}

impl ReadinessConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            node: NodeConfig::default(),
            api: ApiConfig::default(),
            tasks: TasksConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Config {
    /// Load `config.yml` from `dir` and overlay `settings.yml` when present.
    pub fn load(dir: &Path) -> Result<Self> {
        let global_path = paths::global_config_path(dir);
        if !global_path.exists() {
            return Err(NodeError::ConfigNotFound(global_path.display().to_string()));
        }
        let mut merged = read_yaml(&global_path)?;

        let user_path = paths::user_config_path(dir);
        if user_path.exists() {
            merge_values(&mut merged, read_yaml(&user_path)?);
        }

        Self::from_value(merged)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let value = match value {
            Value::Null => Value::Mapping(Default::default()),
            other => other,
        };
        Ok(serde_yaml::from_value(value)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let task = &self.tasks.stake_prelaunch;

        if task.interval_secs == 0 {
            warnings.push(error("tasks.stake_prelaunch.interval_secs must be greater than 0"));
        } else if task.interval_secs < 5 {
            warnings.push(warning(format!(
                "tasks.stake_prelaunch.interval_secs={} polls the node API very often",
                task.interval_secs
            )));
        } else if task.interval_secs > 3600 {
            warnings.push(warning(format!(
                "tasks.stake_prelaunch.interval_secs={} is over an hour",
                task.interval_secs
            )));
        }

        if task.target_status.is_terminal() {
            warnings.push(warning(format!(
                "tasks.stake_prelaunch.target_status '{}' is terminal; minipools in it cannot advance",
                task.target_status
            )));
        }

        if self.readiness.wait && self.readiness.retry_secs == 0 {
            warnings.push(error("readiness.retry_secs must be greater than 0"));
        }

        if let Some(command) = &self.api.command {
            if command.is_empty() {
                warnings.push(error("api.command is empty"));
            }
        }

        if let Some(ssh) = &self.api.ssh {
            if ssh.host.trim().is_empty() {
                warnings.push(error("api.ssh.host is empty"));
            }
            if ssh.user.as_deref().map_or(true, |u| u.trim().is_empty()) {
                warnings.push(error("api.ssh.user must be specified"));
            }
            if ssh.key.is_none() {
                warnings.push(error("api.ssh.key must be specified"));
            }
        }

        warnings
    }
}

fn warning(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Warning,
        message: message.into(),
    }
}

fn error(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Error,
        message: message.into(),
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&data).map_err(|e| {
        NodeError::InvalidConfig(format!("{}: {e}", path.display()))
    })
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; anything else
/// in `overlay` replaces the value in `base`.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

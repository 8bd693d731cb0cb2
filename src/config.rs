use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost:9000".to_string(),
            username: None,
            password: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl ServiceConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                Some((username, password))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub retry_timeout_ms: u64,
    pub measure_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            retry_timeout_ms: 15_000,
            measure_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    pub results_dir: PathBuf,
    pub samples_dir: PathBuf,
    pub repeat_count: u32,
    pub measurement_step: bool,
    /// Metric keys for the measure step; empty means ask the service.
    pub metrics: Vec<String>,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("out"),
            samples_dir: PathBuf::from("samples"),
            repeat_count: 1,
            measurement_step: true,
            metrics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub service: ServiceConfig,
    pub polling: PollingConfig,
    pub sweep: SweepSection,
}

impl SweepConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => SweepConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, config_path))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| SweepError::Config(format!("failed to read {}: {}", path.display(), err)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|err| SweepError::Config(format!("failed to parse config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Zero delays would turn polling into a busy loop against the service.
    pub fn validate(&self) -> Result<()> {
        if self.polling.retry_timeout_ms == 0 {
            return Err(SweepError::Config(
                "polling.retry_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.polling.measure_delay_ms == 0 {
            return Err(SweepError::Config(
                "polling.measure_delay_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| SweepError::Config(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = non_empty_var("ASR_SWEEP_HOST") {
            self.service.host = host;
        }
        if let Some(username) = non_empty_var("ASR_SWEEP_USERNAME") {
            self.service.username = Some(username);
        }
        if let Ok(password) = env::var("ASR_SWEEP_PASSWORD") {
            self.service.password = Some(password);
        }
        if let Some(value) = parsed_var::<u64>("ASR_SWEEP_RETRY_TIMEOUT_MS") {
            self.polling.retry_timeout_ms = value;
        }
        if let Some(value) = parsed_var::<u64>("ASR_SWEEP_MEASURE_DELAY_MS") {
            self.polling.measure_delay_ms = value;
        }
        if let Some(dir) = non_empty_var("ASR_SWEEP_RESULTS_DIR") {
            self.sweep.results_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_var("ASR_SWEEP_SAMPLES_DIR") {
            self.sweep.samples_dir = PathBuf::from(dir);
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn default_config_path() -> Option<PathBuf> {
    non_empty_var("ASR_SWEEP_CONFIG")
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/sweep.toml")))
}

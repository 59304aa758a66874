use crate::backend::feature_store::DEFAULT_FEATURE_SERVICE;
use crate::backend::BackendMode;
use crate::status::IconStyle;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const MODEL_VERSION_ENV: &str = "SPAM_MODEL_VERSION";
pub const BACKEND_MODE_ENV: &str = "ARCHITECTURE_VERSION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_serving_url: String,
    pub feature_server_url: String,
    pub user_data_url: String,
    pub model_version: String,
    pub backend_mode: BackendMode,
    pub feature_service: String,
    /// Unset means requests may wait forever.
    pub request_timeout_seconds: Option<u64>,
    pub icon_style: IconStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_serving_url: "http://localhost:8000".to_string(),
            feature_server_url: "http://localhost:8003".to_string(),
            user_data_url: "http://localhost:8111".to_string(),
            model_version: "v1".to_string(),
            backend_mode: BackendMode::Direct,
            feature_service: DEFAULT_FEATURE_SERVICE.to_string(),
            request_timeout_seconds: None,
            icon_style: IconStyle::Distinct,
        }
    }
}

impl Config {
    /// Apply `SPAM_MODEL_VERSION` and `ARCHITECTURE_VERSION` on top of the file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(MODEL_VERSION_ENV).ok(),
            std::env::var(BACKEND_MODE_ENV).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        model_version: Option<String>,
        backend_mode: Option<String>,
    ) -> Result<()> {
        if let Some(version) = model_version.filter(|v| !v.trim().is_empty()) {
            log::debug!("{} overrides model version: {}", MODEL_VERSION_ENV, version);
            self.model_version = version;
        }
        if let Some(mode) = backend_mode.filter(|m| !m.trim().is_empty()) {
            self.backend_mode = mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}: {}", BACKEND_MODE_ENV, e))?;
            log::debug!("{} selects backend: {}", BACKEND_MODE_ENV, self.backend_mode);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_version.trim().is_empty() {
            anyhow::bail!("model_version must not be empty");
        }
        if self.backend_mode == BackendMode::FeatureStoreMediated
            && self.feature_service.trim().is_empty()
        {
            anyhow::bail!("feature_service must be set for the feature-store backend");
        }
        self.model_serving_base()?;
        self.feature_server_base()?;
        self.user_data_base()?;
        Ok(())
    }

    pub fn model_serving_base(&self) -> Result<Url> {
        parse_base("model_serving_url", &self.model_serving_url)
    }

    pub fn feature_server_base(&self) -> Result<Url> {
        parse_base("feature_server_url", &self.feature_server_url)
    }

    pub fn user_data_base(&self) -> Result<Url> {
        parse_base("user_data_url", &self.user_data_url)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

fn parse_base(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).with_context(|| format!("Invalid {field}: '{value}'"))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("{field} must be an http(s) base URL, got '{value}'");
    }
    Ok(url)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config: {}", path.as_ref().display()))?;

    config.validate()?;
    Ok(config)
}

/// Load `path` when it exists, otherwise run on defaults. A file that
/// exists but does not parse is still an error.
pub fn load_config_if_present<P: AsRef<Path>>(path: P) -> Result<Config> {
    if !path.as_ref().exists() {
        log::debug!(
            "No config file at {}, using defaults",
            path.as_ref().display()
        );
        return Ok(Config::default());
    }

    let config = load_config(&path)?;
    log::info!("Loaded configuration from: {}", path.as_ref().display());
    Ok(config)
}

pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(&Config::default())?;
    fs::write(&path, yaml)
        .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
    Ok(())
}

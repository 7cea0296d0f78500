use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use batch_client::service::parse_base_url;
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "merchant_audit.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    pub service_url: String,
    pub poll_interval_ms: u64,
    pub output_dir: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8000".into(),
            poll_interval_ms: 2000,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(self) -> anyhow::Result<Self> {
        parse_base_url(&self.service_url).context("service_url is not usable")?;
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        Ok(self)
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub service_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

/// Defaults, then the optional config file, then `APP__*` variables, then
/// command-line overrides.
pub fn load_settings(
    config_file: &Path,
    overrides: &SettingsOverrides,
) -> anyhow::Result<ClientSettings> {
    load_settings_with_env(config_file, None, overrides)
}

pub(crate) fn load_settings_with_env(
    config_file: &Path,
    env: Option<HashMap<String, String>>,
    overrides: &SettingsOverrides,
) -> anyhow::Result<ClientSettings> {
    let defaults = ClientSettings::default();
    let settings = Config::builder()
        .set_default("service_url", defaults.service_url)?
        .set_default("poll_interval_ms", defaults.poll_interval_ms)?
        .set_default("output_dir", defaults.output_dir.to_string_lossy().into_owned())?
        .add_source(ConfigFile::from(config_file).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .set_override_option("service_url", overrides.service_url.clone())?
        .set_override_option("poll_interval_ms", overrides.poll_interval_ms)?
        .set_override_option(
            "output_dir",
            overrides
                .output_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned()),
        )?
        .build()
        .with_context(|| format!("failed to read settings from {}", config_file.display()))?
        .try_deserialize::<ClientSettings>()
        .context("invalid client settings")?;

    settings.validate()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

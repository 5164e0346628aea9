//! Configuration management

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::mux::{FanOutMode, MuxOptions};
use crate::{Error, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PROVIDER_MUX_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fan-out scheduling
    pub fan_out: FanOutConfig,
    /// Backends in precedence order
    pub backends: Vec<BackendConfig>,
}

/// Fan-out configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Parallel or sequential invocation of backends
    pub mode: FanOutMode,
}

/// A backend described by a schema document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Display name
    pub name: String,
    /// Path to a JSON-encoded `GetProviderSchemaResponse`
    pub schema: PathBuf,
    /// Whether the backend is included
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Relative schema paths are resolved against the config file.
        if let Some(base) = path.and_then(Path::parent) {
            config.resolve_paths(base);
        }

        Ok(config)
    }

    /// Enabled backends, in order
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }

    /// Mux options derived from this configuration
    #[must_use]
    pub fn mux_options(&self) -> MuxOptions {
        MuxOptions {
            fan_out: self.fan_out.mode,
            ..MuxOptions::default()
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        for backend in &mut self.backends {
            if backend.schema.is_relative() {
                backend.schema = base.join(&backend.schema);
            }
        }
    }
}

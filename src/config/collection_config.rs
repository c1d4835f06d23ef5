use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONFIG_NAME, REASON_BLACKLISTED};
use crate::context::effective_timeout;
use crate::core::{Broker, ComponentId, ComponentRegistry, ConfigError, FilterRegistry, Targets};

fn default_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Operator settings for a collection run.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CollectionConfig {
    /// Per-command timeout; 0 means the ceiling
    #[serde(default = "default_timeout")]
    pub command_timeout_secs: u64,
    /// Components to evaluate; empty means every datasource
    #[serde(default)]
    pub targets: Vec<String>,
    /// Components recorded as skipped without running
    #[serde(default)]
    pub skip_specs: Vec<String>,
    /// Extra filter patterns, added to whatever the catalog declares
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub ansible_host: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub compress: bool,
    /// Scrub credentials from recorded failure messages
    #[serde(default = "default_true")]
    pub scrub: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            targets: Vec::new(),
            skip_specs: Vec::new(),
            filters: BTreeMap::new(),
            output_dir: default_output_dir(),
            display_name: None,
            ansible_host: None,
            parallel: false,
            compress: false,
            scrub: true,
        }
    }
}

impl CollectionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty document deserializes to null rather than a mapping.
        let config: CollectionConfig = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).with_context(|| format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Timeout handed to the host context.
    pub fn command_timeout(&self) -> Duration {
        effective_timeout(Some(Duration::from_secs(self.command_timeout_secs)))
    }

    pub fn targets(&self) -> Targets {
        if self.targets.is_empty() {
            Targets::AllDatasources
        } else {
            Targets::named(self.targets.iter().map(String::as_str))
        }
    }

    /// Every component name mentioned must be registered.
    pub fn validate(&self, registry: &ComponentRegistry) -> Result<(), ConfigError> {
        let named = self
            .targets
            .iter()
            .chain(self.skip_specs.iter())
            .chain(self.filters.keys());
        for name in named {
            if !registry.contains(name) {
                return Err(ConfigError::UnknownComponent(ComponentId::from(name.as_str())));
            }
        }
        Ok(())
    }

    /// Add the configured patterns to `filters`. Filters only grow.
    pub fn apply_filters(&self, filters: &FilterRegistry) {
        for (id, patterns) in &self.filters {
            filters.add_filter(id.as_str(), patterns.iter().map(String::as_str));
        }
    }

    /// A broker with every blacklisted spec already recorded as skipped.
    pub fn seed_broker(&self) -> Broker {
        let mut broker = Broker::new();
        for name in &self.skip_specs {
            if !broker.has_outcome(name) {
                info!("{} is blacklisted by configuration", name);
                broker.mark_skipped(name.as_str(), REASON_BLACKLISTED);
            }
        }
        broker
    }
}

/// Load the configuration for a run.
///
/// An explicit path must exist and parse. Without one, `diag-collector.yaml`
/// in the working directory is used when present, otherwise the defaults.
pub fn load_or_default(config_path: Option<&Path>) -> Result<CollectionConfig> {
    match config_path {
        Some(path) => CollectionConfig::from_yaml_file(path),
        None => {
            let local = Path::new(DEFAULT_CONFIG_NAME);
            if local.exists() {
                info!("Using configuration from {}", local.display());
                CollectionConfig::from_yaml_file(local)
            } else {
                info!("No config file found, using defaults");
                Ok(CollectionConfig::default())
            }
        }
    }
}

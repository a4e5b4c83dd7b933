//! Configuration management

mod schema;

pub use schema::{Config, GeneralConfig, Sheet};

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::notifications::{self, Notifier, Severity};
use crate::rules::{RawRuleNode, RuleError, Ruleset, RulesetCache, compile};

impl Config {
    /// Load configuration from a file or default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(Self::default_path)
            .context("Could not determine config path")?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

            let config: Config = toml::from_str(&content).with_context(|| {
                format!("Failed to parse config from {}", config_path.display())
            })?;

            debug!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration, reporting a missing or broken one through the notifier.
    ///
    /// Never fails: an unusable configuration degrades to an empty one, whose
    /// default rule matches nothing.
    pub fn load_or_report(path: Option<&Path>, notifier: &dyn Notifier) -> Self {
        Self::or_report(Self::load(path), notifier)
    }

    /// Report the outcome of [`Config::load`] and fall back to an empty configuration
    pub fn or_report(loaded: Result<Self>, notifier: &dyn Notifier) -> Self {
        match loaded {
            Ok(config) if config.defaults.is_some() => config,
            Ok(config) => {
                notifier.notify(
                    Severity::Error,
                    &notifications::configuration_missing("no [defaults] table"),
                );
                config
            }
            Err(e) => {
                notifier.notify(
                    Severity::Error,
                    &notifications::configuration_missing(&format!("{:#}", e)),
                );
                Self::default()
            }
        }
    }

    /// Get the default config file path
    /// Uses the platform config directory (via dirs::config_dir), falling back to ~/.config
    pub fn default_path() -> Option<PathBuf> {
        let config_base =
            dirs::config_dir().or_else(|| dirs::home_dir().map(|d| d.join(".config")))?;
        Some(config_base.join("image-autoresize").join("config.toml"))
    }

    /// Site root with `~` and environment variables expanded
    pub fn site_root(&self) -> PathBuf {
        expand_site_root(&self.general.site_root.to_string_lossy())
    }

    /// The top-level rule set (empty when not configured)
    pub fn default_node(&self) -> RawRuleNode {
        self.defaults.clone().unwrap_or_default()
    }

    /// All rule sets of all sheets, in file order
    pub fn child_nodes(&self) -> Vec<RawRuleNode> {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.rulesets.iter().cloned())
            .collect()
    }

    /// Compile the configured rule sets
    pub fn compile(&self) -> Result<Ruleset, RuleError> {
        compile(&self.default_node(), &self.child_nodes())
    }

    /// Compile through a cache, reusing the previous result if nothing changed
    pub fn compile_cached(&self, cache: &mut RulesetCache) -> Result<Arc<Ruleset>, RuleError> {
        cache.get_or_compile(&self.default_node(), &self.child_nodes())
    }
}

static ENV_VAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").ok());

/// Unset variables are left as written
fn expand_site_root(raw: &str) -> PathBuf {
    let home = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
    let raw = match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{home}{rest}")
        }
        _ => raw.to_string(),
    };

    let Some(re) = ENV_VAR.as_ref() else {
        return PathBuf::from(raw);
    };
    let expanded = re.replace_all(&raw, |caps: &Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });
    PathBuf::from(expanded.as_ref())
}

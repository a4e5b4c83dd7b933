//! Configuration schema

use crate::rules::RawRuleNode;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Top-level rule set every other rule set inherits from
    #[serde(default)]
    pub defaults: Option<RawRuleNode>,

    /// Groups of rule sets, evaluated in file order
    #[serde(default, rename = "sheet")]
    pub sheets: Vec<Sheet>,
}

/// General application settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Directory upload paths are made relative to
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable desktop notifications
    #[serde(default)]
    pub notifications_enabled: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            site_root: default_site_root(),
            log_level: default_log_level(),
            notifications_enabled: false,
        }
    }
}

fn default_site_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A labelled group of rule sets
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Sheet {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, rename = "ruleset")]
    pub rulesets: Vec<RawRuleNode>,
}

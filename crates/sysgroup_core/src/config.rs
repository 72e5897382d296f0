//! Resolver configuration
//!
//! Loaded once per run from YAML. Holds the curated exception tables
//! (ignore values, odd group names) and the path rules used when a record
//! carries no usable identity fields.
//!
//! Resolution order for [`ResolverConfig::load_default`]:
//! 1) `SYSGROUP_CONFIG_PATH` if set
//! 2) `config/sysgroup.yaml` (relative) if it exists
//! 3) built-in defaults

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::normalize_value;

/// Env var for overriding the config path.
pub const CONFIG_PATH_ENV: &str = "SYSGROUP_CONFIG_PATH";

/// Default relative path used when `SYSGROUP_CONFIG_PATH` is not set.
pub const DEFAULT_CONFIG_REL_PATH: &str = "config/sysgroup.yaml";

/// Default provenance field present on every metadata record.
pub const DEFAULT_INDEX_KEY: &str = "archivedPath";

/// One Strategy B rule: records under `prefix` get fixed groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPath {
    pub prefix: String,
    /// Falls back to `default_group` when absent.
    #[serde(default)]
    pub system_groups: Option<Vec<String>>,
}

/// Raw on-disk shape of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfigFile {
    pub index_key: String,
    pub ignore_values: Vec<String>,
    pub odd_groupnames: BTreeMap<String, String>,
    pub lab_pattern: String,
    pub default_group: String,
    pub special_paths: Vec<SpecialPath>,
}

impl Default for ResolverConfigFile {
    fn default() -> Self {
        Self {
            index_key: DEFAULT_INDEX_KEY.to_string(),
            ignore_values: ["", "na", "dnf", "none", "root"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            odd_groupnames: BTreeMap::new(),
            lab_pattern: "lab".to_string(),
            default_group: "users".to_string(),
            special_paths: Vec::new(),
        }
    }
}

/// Values that never identify a lab, and lab names that don't follow the
/// `<surname>-lab` convention.
///
/// The odd group name table is shared with every [`Roster`](crate::Roster)
/// built from these tables.
#[derive(Debug, Clone, Default)]
pub struct ExceptionTables {
    pub ignore_values: FxHashSet<String>,
    pub odd_groupnames: Arc<FxHashMap<String, String>>,
}

impl ExceptionTables {
    /// Both tables are keyed by normalized values, since that is what they
    /// are compared against.
    pub fn new<I, J>(ignore_values: I, odd_groupnames: J) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        J: IntoIterator<Item = (String, String)>,
    {
        Self {
            ignore_values: ignore_values
                .into_iter()
                .map(|v| normalize_value(v.as_ref()))
                .collect(),
            odd_groupnames: Arc::new(
                odd_groupnames
                    .into_iter()
                    .map(|(name, group)| (normalize_value(&name), group.trim().to_string()))
                    .collect(),
            ),
        }
    }

    pub fn is_ignored(&self, normalized_value: &str) -> bool {
        self.ignore_values.contains(normalized_value)
    }
}

/// Validated, ready-to-use configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub index_key: String,
    pub exceptions: ExceptionTables,
    pub lab_pattern: Regex,
    pub default_group: String,
    pub special_paths: Vec<SpecialPath>,
}

impl ResolverConfig {
    pub fn from_file(file: ResolverConfigFile) -> Result<Self, ConfigError> {
        let lab_pattern = RegexBuilder::new(&file.lab_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::LabPattern {
                pattern: file.lab_pattern.clone(),
                source,
            })?;

        Ok(Self {
            index_key: file.index_key,
            exceptions: ExceptionTables::new(file.ignore_values, file.odd_groupnames),
            lab_pattern,
            default_group: file.default_group,
            special_paths: file.special_paths,
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: ResolverConfigFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), "loaded resolver config");
        Ok(config)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Groups assigned by a special path rule.
    pub fn special_path_groups(&self, rule: &SpecialPath) -> Vec<String> {
        rule.system_groups
            .clone()
            .unwrap_or_else(|| vec![self.default_group.clone()])
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from_file(ResolverConfigFile::default()).expect("built-in resolver config is valid")
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    let default = PathBuf::from(DEFAULT_CONFIG_REL_PATH);
    default.exists().then_some(default)
}

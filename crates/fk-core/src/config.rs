//! Configuration types and parsing for fkplan.yml

use crate::error::{CoreError, CoreResult};
use crate::ident::{unbracket, SchemaName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default snapshot file, relative to the project directory
const DEFAULT_SCHEMA_PATH: &str = "schema.yml";

/// Main project configuration from fkplan.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional project label, used in output headers
    #[serde(default)]
    pub name: Option<String>,

    /// Schema snapshot files, merged in order
    #[serde(default = "default_schema_paths")]
    pub schema_paths: Vec<String>,

    /// Schema used to qualify bare `references: Table` entries
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Foreign-key columns (`schema.table.column`) treated as plain columns,
    /// e.g. constraints created `WITH NOCHECK` and disabled
    #[serde(default)]
    pub ignored_foreign_keys: Vec<String>,

    /// Mutation planning options
    #[serde(default)]
    pub planning: PlanningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: None,
            schema_paths: default_schema_paths(),
            default_schema: default_schema(),
            ignored_foreign_keys: Vec::new(),
            planning: PlanningConfig::default(),
        }
    }
}

fn default_schema_paths() -> Vec<String> {
    vec![DEFAULT_SCHEMA_PATH.to_string()]
}

fn default_schema() -> String {
    "dbo".to_string()
}

/// Options controlling how foreign-key cycles are split into stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanningConfig {
    /// Which foreign-key columns are moved out of the initial insert
    #[serde(default)]
    pub split_policy: SplitPolicy,

    /// How deferred column groups are laid out across update stages
    #[serde(default)]
    pub deferred_layout: DeferredLayout,

    /// What to do with `NOT NULL` foreign keys inside a cycle
    #[serde(default)]
    pub non_deferrable_cycle_columns: CycleColumnPolicy,
}

/// Which foreign-key columns get deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Defer only columns whose target lies in the same cycle (default)
    #[default]
    Cycles,
    /// Defer every nullable foreign key, cycle or not
    NullableReferences,
}

/// Layout of deferred groups across update stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredLayout {
    /// All deferred groups of a table in stage 1 (default)
    #[default]
    Merged,
    /// One update stage per deferred group, in declaration order
    PerGroup,
}

/// Handling of in-cycle foreign keys that cannot be left NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleColumnPolicy {
    /// Report the cycle as unsatisfiable (default)
    #[default]
    Reject,
    /// Keep the column in the initial insert and order the cycle's inserts
    /// around it; only a cycle of such columns is unsatisfiable
    Pin,
}

impl std::fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitPolicy::Cycles => write!(f, "cycles"),
            SplitPolicy::NullableReferences => write!(f, "nullable_references"),
        }
    }
}

impl std::fmt::Display for DeferredLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeferredLayout::Merged => write!(f, "merged"),
            DeferredLayout::PerGroup => write!(f, "per_group"),
        }
    }
}

impl std::fmt::Display for CycleColumnPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleColumnPolicy::Reject => write!(f, "reject"),
            CycleColumnPolicy::Pin => write!(f, "pin"),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for fkplan.yml or fkplan.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("fkplan.yml");
        let yaml_path = dir.join("fkplan.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if SchemaName::try_new(self.default_schema.as_str()).is_none() {
            return Err(CoreError::ConfigInvalid {
                message: "default_schema cannot be empty".to_string(),
            });
        }

        if self.schema_paths.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one schema_paths entry must be specified".to_string(),
            });
        }

        for entry in &self.ignored_foreign_keys {
            if entry.split('.').count() != 3 || entry.split('.').any(str::is_empty) {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "ignored_foreign_keys entry '{}' must have the form schema.table.column",
                        entry
                    ),
                });
            }
        }

        Ok(())
    }

    /// Snapshot paths resolved against the project root
    pub fn schema_paths_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.schema_paths.iter().map(|p| root.join(p)).collect()
    }

    /// Check whether a foreign-key column is configured to be ignored
    pub fn is_ignored_foreign_key(&self, schema: &str, table: &str, column: &str) -> bool {
        self.ignored_foreign_keys
            .iter()
            .any(|entry| ignored_entry_matches(entry, schema, table, column))
    }
}

/// Match one `schema.table.column` entry; `[..]` quoting is ignored.
pub(crate) fn ignored_entry_matches(entry: &str, schema: &str, table: &str, column: &str) -> bool {
    let mut parts = entry.split('.').map(unbracket);
    parts.next() == Some(schema)
        && parts.next() == Some(table)
        && parts.next() == Some(column)
        && parts.next().is_none()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

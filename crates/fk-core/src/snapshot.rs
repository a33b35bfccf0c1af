//! Schema snapshot files
//!
//! A snapshot is the YAML form of imported catalog metadata: tables with
//! their columns, primary keys and foreign-key references. Several snapshot
//! files can be merged into one [`SchemaGraph`].

use crate::config::{ignored_entry_matches, Config};
use crate::error::{CoreError, CoreResult};
use crate::ident::{ColumnName, ForeignKeyGroupId, SchemaName, TableId, TableName};
use crate::schema::{Column, ForeignKeyRef, SchemaGraph, Table};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A schema snapshot file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    /// Tables declared in this file
    #[serde(default)]
    pub tables: Vec<SnapshotTable>,
}

/// A table entry in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotTable {
    /// Schema name; falls back to the configured default schema
    #[serde(default)]
    pub schema: Option<String>,

    pub name: TableName,

    /// Primary key columns in key order
    #[serde(default)]
    pub primary_key: Vec<ColumnName>,

    #[serde(default)]
    pub columns: Vec<SnapshotColumn>,
}

/// A column entry in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotColumn {
    pub name: ColumnName,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub identity: bool,

    #[serde(default)]
    pub has_default: bool,

    /// Referenced table, `schema.table` or bare `table`
    #[serde(default)]
    pub references: Option<String>,

    /// Foreign-key constraint name shared by the columns of a composite key
    #[serde(default)]
    pub constraint: Option<ForeignKeyGroupId>,
}

impl SchemaFile {
    /// Load a snapshot file from a path
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;

        serde_yaml::from_str(&content).map_err(|e| CoreError::SchemaParseError {
            path: path.display().to_string(),
            details: e.to_string(),
        })
    }

    /// Convert the entries of this file into resolved-identity tables.
    ///
    /// Ignored foreign keys (see [`Config::ignored_foreign_keys`]) become
    /// plain columns.
    pub fn into_tables(self, config: &Config) -> CoreResult<Vec<Table>> {
        self.tables
            .into_iter()
            .map(|table| table.into_table(config))
            .collect()
    }
}

impl SnapshotTable {
    fn into_table(self, config: &Config) -> CoreResult<Table> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => config.default_schema.clone(),
        };
        let schema = SchemaName::try_new(schema.as_str()).ok_or_else(|| {
            CoreError::InvalidIdentifier {
                context: format!("schema of table '{}'", self.name),
                value: schema.clone(),
            }
        })?;
        let id = TableId {
            schema,
            name: self.name,
        };

        let mut columns = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let ignored = column.references.is_some()
                && config.is_ignored_foreign_key(&id.schema, &id.name, &column.name);
            if ignored {
                log::debug!("Ignoring foreign key {}.{}", id, column.name);
            }

            let foreign_key = match column.references {
                Some(target) if !ignored => Some(ForeignKeyRef {
                    target: TableId::parse(&target, &config.default_schema)?,
                    group: column.constraint,
                }),
                _ => None,
            };

            columns.push(Column {
                name: column.name,
                nullable: column.nullable,
                identity: column.identity,
                has_default: column.has_default,
                foreign_key,
            });
        }

        Ok(Table {
            id,
            columns,
            primary_key: self.primary_key,
        })
    }
}

/// Load and merge snapshot files into a frozen [`SchemaGraph`].
pub fn load_schema_graph(paths: &[PathBuf], config: &Config) -> CoreResult<SchemaGraph> {
    let mut tables = Vec::new();
    for path in paths {
        let file = SchemaFile::load(path)?;
        log::debug!("Loaded {} tables from {}", file.tables.len(), path.display());
        tables.extend(file.into_tables(config)?);
    }

    warn_unmatched_ignored_keys(&tables, config);
    SchemaGraph::new(tables)
}

/// Parse a single in-memory snapshot into a [`SchemaGraph`].
pub fn schema_graph_from_yaml(yaml: &str, config: &Config) -> CoreResult<SchemaGraph> {
    let file: SchemaFile = serde_yaml::from_str(yaml)?;
    let tables = file.into_tables(config)?;
    warn_unmatched_ignored_keys(&tables, config);
    SchemaGraph::new(tables)
}

fn warn_unmatched_ignored_keys(tables: &[Table], config: &Config) {
    for entry in &config.ignored_foreign_keys {
        let matched = tables.iter().any(|table| {
            table.columns.iter().any(|column| {
                ignored_entry_matches(entry, &table.id.schema, &table.id.name, &column.name)
            })
        });
        if !matched {
            log::warn!("ignored_foreign_keys entry '{}' matches no column", entry);
        }
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;

//! In-memory schema graph: tables, columns and foreign-key references.
//!
//! A [`SchemaGraph`] is built once from imported catalog metadata and is
//! read-only afterwards. Construction resolves every foreign key, so code
//! holding a `&SchemaGraph` never sees a dangling reference.

use crate::error::{CoreError, CoreResult};
use crate::ident::{ColumnName, ForeignKeyGroupId, TableId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Reference from a column to the primary key of a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table, looked up through the owning graph
    pub target: TableId,

    /// Composite foreign key this column belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<ForeignKeyGroupId>,
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: ColumnName,
    pub nullable: bool,
    /// Identity / auto-generated column
    pub identity: bool,
    /// Column carries a server-side default and may be omitted on insert
    pub has_default: bool,
    pub foreign_key: Option<ForeignKeyRef>,
}

impl Column {
    /// Create a `NOT NULL` column without default or foreign key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: ColumnName::new(name),
            nullable: false,
            identity: false,
            has_default: false,
            foreign_key: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Make this column a foreign key into `target`.
    pub fn references(mut self, target: TableId) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            target,
            group: None,
        });
        self
    }

    /// Attach this foreign-key column to a composite group.
    ///
    /// Has no effect on a column without a foreign key.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        if let Some(fk) = self.foreign_key.as_mut() {
            fk.group = Some(ForeignKeyGroupId::new(group));
        }
        self
    }

    /// Whether an insert may leave this column at its NULL/default state.
    pub fn can_be_omitted(&self) -> bool {
        (self.nullable || self.has_default) && !self.identity
    }

    /// Target table of this column's foreign key.
    pub fn target(&self) -> Option<&TableId> {
        self.foreign_key.as_ref().map(|fk| &fk.target)
    }
}

/// Key under which foreign-key columns are grouped.
///
/// Columns that share a constraint name form one group; a foreign-key column
/// without a group id is a group of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Named(ForeignKeyGroupId),
    Column(ColumnName),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Named(id) => write!(f, "{id}"),
            GroupKey::Column(name) => write!(f, "{name}"),
        }
    }
}

/// One foreign key of a table, possibly spanning several columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyGroup {
    pub key: GroupKey,
    pub target: TableId,
    /// Member columns in declaration order
    pub columns: Vec<ColumnName>,
    /// Declaration index of the first member column
    pub position: usize,
}

/// A table with its ordered columns and primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub columns: Vec<Column>,
    /// Primary key columns in key order; empty for a heap without key
    pub primary_key: Vec<ColumnName>,
}

impl Table {
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(ColumnName::new).collect();
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Declaration index of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    /// Columns carrying a foreign key, in declaration order.
    pub fn foreign_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.foreign_key.is_some())
    }

    /// Whether any column references this table itself.
    pub fn is_self_referencing(&self) -> bool {
        self.foreign_key_columns()
            .any(|c| c.target() == Some(&self.id))
    }

    /// Foreign keys of this table, ordered by their first column.
    pub fn foreign_key_groups(&self) -> Vec<ForeignKeyGroup> {
        let mut groups: Vec<ForeignKeyGroup> = Vec::new();
        for (position, column) in self.columns.iter().enumerate() {
            let Some(fk) = &column.foreign_key else {
                continue;
            };
            let key = match &fk.group {
                Some(id) => GroupKey::Named(id.clone()),
                None => GroupKey::Column(column.name.clone()),
            };
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.columns.push(column.name.clone()),
                None => groups.push(ForeignKeyGroup {
                    key,
                    target: fk.target.clone(),
                    columns: vec![column.name.clone()],
                    position,
                }),
            }
        }
        groups
    }
}

/// The frozen set of all tables of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaGraph {
    tables: BTreeMap<TableId, Table>,
}

impl SchemaGraph {
    /// Build and validate a graph.
    ///
    /// Fails on duplicate tables or columns, unknown primary-key columns,
    /// dangling foreign keys or foreign keys into a table without primary
    /// key, and composite groups spanning several targets.
    pub fn new(tables: impl IntoIterator<Item = Table>) -> CoreResult<Self> {
        let mut map = BTreeMap::new();
        for table in tables {
            if map.contains_key(&table.id) {
                return Err(CoreError::DuplicateTable {
                    table: table.id.to_string(),
                });
            }
            validate_table(&table)?;
            map.insert(table.id.clone(), table);
        }

        let graph = Self { tables: map };
        graph.resolve_foreign_keys()?;
        log::debug!("Schema graph built with {} tables", graph.len());
        Ok(graph)
    }

    fn resolve_foreign_keys(&self) -> CoreResult<()> {
        for table in self.tables.values() {
            for column in table.foreign_key_columns() {
                let Some(target) = column.target() else {
                    continue;
                };
                let Some(referenced) = self.tables.get(target) else {
                    return Err(CoreError::DanglingForeignKey {
                        table: table.id.to_string(),
                        column: column.name.to_string(),
                        target: target.to_string(),
                    });
                };
                // A foreign key references the target's primary key.
                if referenced.primary_key.is_empty() {
                    return Err(CoreError::KeylessForeignKeyTarget {
                        table: table.id.to_string(),
                        column: column.name.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn table(&self, id: &TableId) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn contains(&self, id: &TableId) -> bool {
        self.tables.contains_key(id)
    }

    /// All tables in `TableId` order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// All table identities in order.
    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn validate_table(table: &Table) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for column in &table.columns {
        if !seen.insert(column.name.as_str()) {
            return Err(CoreError::DuplicateColumn {
                table: table.id.to_string(),
                column: column.name.to_string(),
            });
        }
    }

    let mut key_seen = HashSet::new();
    for key in &table.primary_key {
        if !seen.contains(key.as_str()) {
            return Err(CoreError::UnknownPrimaryKeyColumn {
                table: table.id.to_string(),
                column: key.to_string(),
            });
        }
        if !key_seen.insert(key.as_str()) {
            return Err(CoreError::DuplicatePrimaryKeyColumn {
                table: table.id.to_string(),
                column: key.to_string(),
            });
        }
    }

    let mut group_targets: BTreeMap<&ForeignKeyGroupId, &TableId> = BTreeMap::new();
    for column in table.foreign_key_columns() {
        let Some(fk) = &column.foreign_key else {
            continue;
        };
        let Some(group) = &fk.group else {
            continue;
        };
        match group_targets.get(group) {
            Some(first) if *first != &fk.target => {
                return Err(CoreError::MixedForeignKeyGroup {
                    table: table.id.to_string(),
                    group: group.to_string(),
                    first: first.to_string(),
                    second: fk.target.to_string(),
                });
            }
            Some(_) => {}
            None => {
                group_targets.insert(group, &fk.target);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;

//! Strongly-typed catalog identifiers.
//!
//! Tables refer to each other by [`TableId`], never by pointer. The derived
//! ordering (schema first, then table) is the total order every traversal in
//! fkplan uses, so output is stable across runs.

use crate::error::{CoreError, CoreResult};
use crate::newtype_string::define_newtype_string;
use serde::{Deserialize, Serialize};
use std::fmt;

define_newtype_string! {
    /// A non-empty database schema name (e.g. `Production`).
    pub struct SchemaName;
}

define_newtype_string! {
    /// A non-empty, unqualified table name (e.g. `Product`).
    pub struct TableName;
}

define_newtype_string! {
    /// A non-empty column name, unique within its table.
    pub struct ColumnName;
}

define_newtype_string! {
    /// Identifier shared by the columns of one composite foreign key,
    /// normally the constraint name.
    pub struct ForeignKeyGroupId;
}

/// Schema-qualified table identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TableId {
    pub schema: SchemaName,
    pub name: TableName,
}

impl TableId {
    /// Create a table identity from its parts.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: SchemaName::new(schema),
            name: TableName::new(name),
        }
    }

    /// Parse `schema.table`, or a bare `table` qualified with `default_schema`.
    ///
    /// Square brackets around either part are stripped (`[Sales].[Store]`).
    pub fn parse(value: &str, default_schema: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidIdentifier {
            context: "table reference".to_string(),
            value: value.to_string(),
        };

        let (schema, name) = match value.split_once('.') {
            Some((schema, name)) => (unbracket(schema), unbracket(name)),
            None => (default_schema, unbracket(value)),
        };

        if name.contains('.') {
            return Err(invalid());
        }

        Ok(Self {
            schema: SchemaName::try_new(schema).ok_or_else(invalid)?,
            name: TableName::try_new(name).ok_or_else(invalid)?,
        })
    }

    /// Returns the fully qualified `schema.table` form.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Trim a name part and strip one pair of `[..]` quotes.
pub(crate) fn unbracket(part: &str) -> &str {
    let part = part.trim();
    part.strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
        .unwrap_or(part)
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.qualified()
    }
}

impl TryFrom<String> for TableId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !value.contains('.') {
            return Err(format!("table id '{value}' must be schema-qualified"));
        }
        Self::parse(&value, "").map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "ident_test.rs"]
mod tests;

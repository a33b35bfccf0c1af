//! Shared test utilities for fk-plan

use fk_core::{Column, ColumnName, SchemaGraph, Table, TableId};

/// Table identity in `dbo`, unless `name` is already qualified
pub fn tid(name: &str) -> TableId {
    match name.split_once('.') {
        Some((schema, table)) => TableId::new(schema, table),
        None => TableId::new("dbo", name),
    }
}

/// Start a table with an identity primary key column `Id`
pub fn table(name: &str) -> TableBuilder {
    TableBuilder {
        table: Table::new(tid(name))
            .with_column(Column::new("Id").identity())
            .with_primary_key(["Id"]),
    }
}

/// Build a resolved schema graph, panicking on invalid input
pub fn schema(tables: Vec<Table>) -> SchemaGraph {
    SchemaGraph::new(tables).expect("test schema must be valid")
}

/// Fluent builder for test tables
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    /// Plain `NOT NULL` column
    pub fn column(self, name: &str) -> Self {
        self.with(Column::new(name))
    }

    pub fn nullable_column(self, name: &str) -> Self {
        self.with(Column::new(name).nullable())
    }

    /// `NOT NULL` foreign key without default
    pub fn fk(self, name: &str, target: &str) -> Self {
        self.with(Column::new(name).references(tid(target)))
    }

    pub fn nullable_fk(self, name: &str, target: &str) -> Self {
        self.with(Column::new(name).nullable().references(tid(target)))
    }

    /// `NOT NULL` foreign key with a server-side default
    pub fn default_fk(self, name: &str, target: &str) -> Self {
        self.with(Column::new(name).with_default().references(tid(target)))
    }

    /// Nullable member column of composite foreign key `group`
    pub fn group_fk(self, name: &str, target: &str, group: &str) -> Self {
        self.with(
            Column::new(name)
                .nullable()
                .references(tid(target))
                .in_group(group),
        )
    }

    /// Foreign key that is also part of the primary key
    pub fn key_fk(mut self, name: &str, target: &str) -> Self {
        self.table.primary_key.push(ColumnName::new(name));
        self.fk(name, target)
    }

    pub fn with(mut self, column: Column) -> Self {
        self.table.columns.push(column);
        self
    }

    pub fn build(self) -> Table {
        self.table
    }
}

//! fk-core - Core library for fkplan
//!
//! This crate provides catalog identifiers, the frozen [`SchemaGraph`] of
//! tables/columns/foreign keys, schema snapshot loading, and configuration
//! parsing shared by all fkplan components.

pub mod config;
pub mod error;
pub mod ident;
mod newtype_string;
pub mod schema;
pub mod snapshot;

pub use config::{Config, CycleColumnPolicy, DeferredLayout, PlanningConfig, SplitPolicy};
pub use error::{CoreError, CoreResult};
pub use ident::{ColumnName, ForeignKeyGroupId, SchemaName, TableId, TableName};
pub use schema::{Column, ForeignKeyGroup, ForeignKeyRef, GroupKey, SchemaGraph, Table};
pub use snapshot::{load_schema_graph, schema_graph_from_yaml, SchemaFile};

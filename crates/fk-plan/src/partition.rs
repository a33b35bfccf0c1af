//! Column partitioning: which foreign keys are left out of the initial insert
//!
//! A foreign key whose target lies in the same cycle as its own table is
//! *breaking*: the referenced row may not exist yet when this row is
//! inserted, so the column is inserted as NULL (or its default) and set by a
//! later update stage. All columns of a composite foreign key move together.

use crate::cycles::Cycle;
use crate::error::{PlanError, PlanResult};
use crate::graph::ordered_toposort;
use fk_core::{
    ColumnName, CycleColumnPolicy, DeferredLayout, ForeignKeyGroup, GroupKey, PlanningConfig,
    SchemaGraph, SplitPolicy, Table, TableId,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Why a foreign-key group was moved out of the initial insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    /// The target table lies in the same cycle
    CycleBreaking,
    /// Nullable reference deferred by `split_policy: nullable_references`
    NullableReference,
}

/// A foreign-key group assigned to an update stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredGroup {
    pub key: GroupKey,
    pub target: TableId,
    pub columns: Vec<ColumnName>,
    pub reason: DeferReason,
    /// Update stage index, always >= 1
    pub stage: usize,
}

/// Column split of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub table: TableId,
    /// Columns set by the initial insert, in declaration order
    pub safe: Vec<ColumnName>,
    /// In-cycle foreign-key columns kept in the initial insert because they
    /// cannot be left NULL (`pin` policy only); a subset of `safe`
    pub pinned: Vec<ColumnName>,
    /// Deferred groups ordered by stage, then declaration
    pub deferred: Vec<DeferredGroup>,
}

impl Partition {
    /// Number of stages the table needs, including the insert
    pub fn stage_count(&self) -> usize {
        1 + self.deferred.iter().map(|g| g.stage).max().unwrap_or(0)
    }

    pub fn is_split(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Columns set by update stage `stage`, in declaration order of groups
    pub fn stage_columns(&self, stage: usize) -> Vec<ColumnName> {
        self.deferred
            .iter()
            .filter(|g| g.stage == stage)
            .flat_map(|g| g.columns.iter().cloned())
            .collect()
    }

    /// Tables referenced by pinned columns, the table itself included
    pub fn pinned_targets(&self, table: &Table) -> BTreeSet<TableId> {
        self.pinned
            .iter()
            .filter_map(|name| table.column(name).and_then(|c| c.target()))
            .cloned()
            .collect()
    }
}

/// Whether an insert may omit every column of a foreign-key group.
///
/// Key and identity columns are never deferred, and `NOT NULL` columns only
/// when a default fills them in.
pub fn group_is_deferrable(table: &Table, group: &ForeignKeyGroup) -> bool {
    group.columns.iter().all(|name| {
        !table.is_primary_key(name) && table.column(name).is_some_and(|c| c.can_be_omitted())
    })
}

/// Whether a group qualifies for `split_policy: nullable_references`.
///
/// A table without primary key is never split: its rows cannot be found
/// again by an update.
fn is_nullable_reference(table: &Table, group: &ForeignKeyGroup) -> bool {
    !table.primary_key.is_empty()
        && group.columns.iter().all(|name| {
            !table.is_primary_key(name)
                && table
                    .column(name)
                    .is_some_and(|c| c.nullable && !c.identity)
        })
}

/// Classify a foreign-key group of `table`.
///
/// `cycle` is the cycle `table` belongs to, if any.
pub fn classify_group(
    table: &Table,
    group: &ForeignKeyGroup,
    cycle: Option<&Cycle>,
    options: &PlanningConfig,
) -> GroupClass {
    let breaking = cycle.is_some_and(|c| c.contains(&group.target));
    let deferrable = group_is_deferrable(table, group);

    if breaking {
        return match (deferrable, options.non_deferrable_cycle_columns) {
            (true, _) => GroupClass::Deferred(DeferReason::CycleBreaking),
            (false, CycleColumnPolicy::Pin) => GroupClass::Pinned,
            (false, CycleColumnPolicy::Reject) => GroupClass::Unsatisfiable,
        };
    }

    if options.split_policy == SplitPolicy::NullableReferences && is_nullable_reference(table, group)
    {
        return GroupClass::Deferred(DeferReason::NullableReference);
    }

    GroupClass::Safe
}

/// Outcome of classifying one foreign-key group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupClass {
    /// Set by the initial insert
    Safe,
    /// In-cycle, not deferrable, kept in the initial insert
    Pinned,
    /// Moved to an update stage
    Deferred(DeferReason),
    /// In-cycle, not deferrable, and the policy forbids pinning
    Unsatisfiable,
}

/// Split the columns of one table.
///
/// `cycle` must be the cycle `table` belongs to (or `None`).
pub fn partition(
    table: &Table,
    cycle: Option<&Cycle>,
    options: &PlanningConfig,
) -> PlanResult<Partition> {
    let mut pinned = Vec::new();
    let mut candidates = Vec::new();

    for group in table.foreign_key_groups() {
        match classify_group(table, &group, cycle, options) {
            GroupClass::Safe => {}
            GroupClass::Pinned => pinned.extend(group.columns.iter().cloned()),
            GroupClass::Unsatisfiable => {
                return Err(unsatisfiable(&table.id, &group.columns, cycle));
            }
            GroupClass::Deferred(reason) => {
                candidates.push((group, reason));
            }
        }
    }

    // Groups arrive in declaration order of their first column.
    let deferred: Vec<DeferredGroup> = candidates
        .into_iter()
        .enumerate()
        .map(|(idx, (group, reason))| DeferredGroup {
            stage: match options.deferred_layout {
                DeferredLayout::Merged => 1,
                DeferredLayout::PerGroup => idx + 1,
            },
            key: group.key,
            target: group.target,
            columns: group.columns,
            reason,
        })
        .collect();

    let deferred_columns: BTreeSet<&ColumnName> =
        deferred.iter().flat_map(|g| g.columns.iter()).collect();

    let safe: Vec<ColumnName> = table
        .columns
        .iter()
        .map(|c| &c.name)
        .filter(|name| !deferred_columns.contains(name))
        .cloned()
        .collect();

    pinned.sort_by_key(|name: &ColumnName| table.position(name));

    Ok(Partition {
        table: table.id.clone(),
        safe,
        pinned,
        deferred,
    })
}

/// Partitions of every member of a cycle, plus the order of their inserts.
#[derive(Debug, Clone)]
pub struct CyclePartition {
    pub partitions: BTreeMap<TableId, Partition>,
    /// Member tables in the order their initial inserts must run
    pub insert_order: Vec<TableId>,
}

/// Partition every table of a cycle and order their initial inserts.
///
/// Pinned columns must be satisfiable by some insert order; when they form
/// a cycle themselves the whole cycle is unsatisfiable.
pub fn partition_cycle(
    schema: &SchemaGraph,
    cycle: &Cycle,
    options: &PlanningConfig,
) -> PlanResult<CyclePartition> {
    let mut partitions = BTreeMap::new();
    let mut dependencies: BTreeMap<TableId, BTreeSet<TableId>> = BTreeMap::new();

    for id in cycle.tables() {
        let table = schema.table(id).ok_or_else(|| PlanError::UnknownTable {
            table: id.to_string(),
        })?;
        let part = partition(table, Some(cycle), options)?;
        dependencies.insert(id.clone(), part.pinned_targets(table));
        partitions.insert(id.clone(), part);
    }

    let insert_order = match ordered_toposort(cycle.tables(), &dependencies) {
        Ok(order) => order,
        Err(stuck) => {
            let table = &stuck[0];
            let columns = partitions
                .get(table)
                .map(|p| p.pinned.clone())
                .unwrap_or_default();
            return Err(unsatisfiable(table, &columns, Some(cycle)));
        }
    };

    Ok(CyclePartition {
        partitions,
        insert_order,
    })
}

fn unsatisfiable(table: &TableId, columns: &[ColumnName], cycle: Option<&Cycle>) -> PlanError {
    let columns: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
    PlanError::UnsatisfiableCycle {
        table: table.to_string(),
        columns: columns.join(", "),
        cycle: cycle.map(|c| c.to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "partition_test.rs"]
mod tests;

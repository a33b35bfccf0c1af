//! Mutation plans: the ordered insert/update stages of every table
//!
//! Stage 0 of a table is its initial INSERT and carries the primary key and
//! every column that is safe to set immediately. Stages 1..N are UPDATEs
//! addressed by primary key that fill in the deferred foreign keys once the
//! rows they reference exist.

use crate::cycles::{Component, Condensation, Cycle};
use crate::error::{PlanError, PlanResult};
use crate::graph::FkGraph;
use crate::partition::{partition, partition_cycle, Partition};
use crate::validate::{validate_plan, validate_plans, ValidationContext};
use fk_core::{ColumnName, GroupKey, PlanningConfig, SchemaGraph, Table, TableId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of statement a stage is emitted as
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Insert,
    Update,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Insert => write!(f, "insert"),
            StageKind::Update => write!(f, "update"),
        }
    }
}

/// Reference to one stage of one table's plan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StageRef {
    pub table: TableId,
    pub index: usize,
}

impl StageRef {
    pub fn new(table: TableId, index: usize) -> Self {
        Self { table, index }
    }

    /// The initial insert of `table`
    pub fn insert(table: &TableId) -> Self {
        Self::new(table.clone(), 0)
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.index)
    }
}

/// One INSERT or UPDATE statement of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationStage {
    pub table: TableId,
    /// 0 for the insert, 1..N for updates
    pub index: usize,
    pub kind: StageKind,
    /// Columns this stage sets, in declaration order
    pub columns: Vec<ColumnName>,
    /// Primary key columns addressing the row (updates only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_columns: Vec<ColumnName>,
    /// Identity columns the insert hands back to the caller
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated: Vec<ColumnName>,
    /// Foreign keys an update stage fills in
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupKey>,
    /// Stages that must have run before this one
    pub prerequisites: BTreeSet<StageRef>,
}

impl MutationStage {
    pub fn stage_ref(&self) -> StageRef {
        StageRef::new(self.table.clone(), self.index)
    }

    /// Kind and number an emitter maps to `Insert<T>` / `Update{N}<T>`
    pub fn ordinal(&self) -> (StageKind, usize) {
        (self.kind, self.index)
    }

    pub fn is_insert(&self) -> bool {
        self.kind == StageKind::Insert
    }

    pub fn sets(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// The ordered stages of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationPlan {
    pub table: TableId,
    pub stages: Vec<MutationStage>,
}

impl MutationPlan {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn is_split(&self) -> bool {
        self.stages.len() > 1
    }

    pub fn stage(&self, index: usize) -> Option<&MutationStage> {
        self.stages.get(index)
    }

    /// The initial insert, if the plan has any stage
    pub fn insert(&self) -> Option<&MutationStage> {
        self.stages.first()
    }

    /// Update stages in order
    pub fn updates(&self) -> &[MutationStage] {
        self.stages.get(1..).unwrap_or_default()
    }

    /// Stage that sets `column`
    pub fn stage_of(&self, column: &str) -> Option<usize> {
        self.stages
            .iter()
            .find(|s| s.sets(column))
            .map(|s| s.index)
    }
}

/// Plans of every table of a schema with their global execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSet {
    pub plans: BTreeMap<TableId, MutationPlan>,
    /// Every stage of every plan, each after all of its prerequisites
    pub schedule: Vec<StageRef>,
    /// Cycles the plans were split around
    pub cycles: Vec<Cycle>,
}

impl PlanSet {
    pub fn plan(&self, table: &TableId) -> Option<&MutationPlan> {
        self.plans.get(table)
    }

    pub fn stage(&self, stage: &StageRef) -> Option<&MutationStage> {
        self.plans.get(&stage.table)?.stage(stage.index)
    }

    /// Plans with more than one stage
    pub fn split_plans(&self) -> impl Iterator<Item = &MutationPlan> {
        self.plans.values().filter(|p| p.is_split())
    }

    pub fn stage_count(&self) -> usize {
        self.plans.values().map(|p| p.stage_count()).sum()
    }
}

/// Build the plan of every table and the global schedule.
///
/// The result is checked by the validator; a violation means the builder is
/// broken and is reported as [`PlanError::InternalPlanInconsistency`].
pub fn build_all_plans(schema: &SchemaGraph, options: &PlanningConfig) -> PlanResult<PlanSet> {
    let graph = FkGraph::build(schema)?;
    let condensation = Condensation::from_graph(&graph);

    let mut plans = BTreeMap::new();
    let mut schedule = Vec::with_capacity(schema.len());

    for component in condensation.components() {
        let cycle = component_cycle(&condensation, component);
        let (component_plans, order) = plan_component(schema, component, cycle.as_ref(), options)?;

        let mut updates = Vec::new();
        for id in &order {
            let Some(plan) = component_plans.get(id) else {
                continue;
            };
            schedule.push(StageRef::insert(id));
            updates.extend(plan.updates().iter().map(|s| s.stage_ref()));
        }
        updates.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.table.cmp(&b.table)));
        schedule.extend(updates);
        plans.extend(component_plans);
    }

    let plan_set = PlanSet {
        plans,
        schedule,
        cycles: condensation.cycles(),
    };

    let ctx = ValidationContext::from_condensation(schema, condensation, *options);
    validate_plans(&plan_set, &ctx)
        .map_err(|violations| PlanError::InternalPlanInconsistency { violations })?;

    log::debug!(
        "Planned {} tables: {} stages, {} split, {} cycle(s)",
        plan_set.plans.len(),
        plan_set.stage_count(),
        plan_set.split_plans().count(),
        plan_set.cycles.len()
    );
    Ok(plan_set)
}

/// Build the plan of a single table.
///
/// Only the component `table` belongs to is partitioned, so unrelated
/// unsatisfiable cycles do not fail the call.
pub fn build_plan(
    schema: &SchemaGraph,
    table: &TableId,
    options: &PlanningConfig,
) -> PlanResult<MutationPlan> {
    let graph = FkGraph::build(schema)?;
    let condensation = Condensation::from_graph(&graph);
    let unknown = || PlanError::UnknownTable {
        table: table.to_string(),
    };

    let component = condensation
        .component_of(table)
        .and_then(|idx| condensation.components().get(idx))
        .ok_or_else(unknown)?;
    let cycle = component_cycle(&condensation, component);
    let (mut plans, _) = plan_component(schema, component, cycle.as_ref(), options)?;
    let plan = plans.remove(table).ok_or_else(unknown)?;

    let ctx = ValidationContext::from_condensation(schema, condensation, *options);
    validate_plan(&plan, &ctx)
        .map_err(|violations| PlanError::InternalPlanInconsistency { violations })?;
    Ok(plan)
}

fn component_cycle(condensation: &Condensation, component: &Component) -> Option<Cycle> {
    component
        .tables
        .first()
        .and_then(|first| condensation.cycle_of(first))
}

/// Plans of one component, with the order of their initial inserts
fn plan_component(
    schema: &SchemaGraph,
    component: &Component,
    cycle: Option<&Cycle>,
    options: &PlanningConfig,
) -> PlanResult<(BTreeMap<TableId, MutationPlan>, Vec<TableId>)> {
    let (partitions, order) = match cycle {
        Some(cycle) => {
            let split = partition_cycle(schema, cycle, options)?;
            (split.partitions, split.insert_order)
        }
        None => {
            let mut partitions = BTreeMap::new();
            for id in &component.tables {
                let table = lookup(schema, id)?;
                partitions.insert(id.clone(), partition(table, None, options)?);
            }
            (partitions, component.tables.clone())
        }
    };

    let members: &[TableId] = cycle.map(|c| c.tables()).unwrap_or_default();
    let mut plans = BTreeMap::new();
    for (id, part) in &partitions {
        let table = lookup(schema, id)?;
        plans.insert(id.clone(), plan_from_partition(table, part, members));
    }
    Ok((plans, order))
}

fn lookup<'a>(schema: &'a SchemaGraph, id: &TableId) -> PlanResult<&'a Table> {
    schema.table(id).ok_or_else(|| PlanError::UnknownTable {
        table: id.to_string(),
    })
}

/// Turn a column partition into stages.
///
/// `cycle_members` lists the tables of the cycle `table` belongs to; every
/// update waits for all of their inserts.
fn plan_from_partition(table: &Table, part: &Partition, cycle_members: &[TableId]) -> MutationPlan {
    let insert_prerequisites: BTreeSet<StageRef> = part
        .safe
        .iter()
        .filter_map(|name| table.column(name).and_then(|c| c.target()))
        .filter(|target| **target != table.id)
        .map(StageRef::insert)
        .collect();

    let generated = part
        .safe
        .iter()
        .filter(|name| table.column(name).is_some_and(|c| c.identity))
        .cloned()
        .collect();

    let mut stages = vec![MutationStage {
        table: table.id.clone(),
        index: 0,
        kind: StageKind::Insert,
        columns: part.safe.clone(),
        key_columns: Vec::new(),
        generated,
        groups: Vec::new(),
        prerequisites: insert_prerequisites,
    }];

    for index in 1..part.stage_count() {
        let groups: Vec<_> = part.deferred.iter().filter(|g| g.stage == index).collect();

        let mut prerequisites: BTreeSet<StageRef> =
            cycle_members.iter().map(StageRef::insert).collect();
        prerequisites.extend(groups.iter().map(|g| StageRef::insert(&g.target)));
        prerequisites.insert(StageRef::new(table.id.clone(), index - 1));

        stages.push(MutationStage {
            table: table.id.clone(),
            index,
            kind: StageKind::Update,
            columns: part.stage_columns(index),
            key_columns: table.primary_key.clone(),
            generated: Vec::new(),
            groups: groups.iter().map(|g| g.key.clone()).collect(),
            prerequisites,
        });
    }

    MutationPlan {
        table: table.id.clone(),
        stages,
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;

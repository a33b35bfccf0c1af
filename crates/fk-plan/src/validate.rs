//! Plan validation
//!
//! Every check is independent and reports [`Violation`]s with a stable `V`
//! code. The builder runs the validator on its own output, so a violation
//! there indicates a bug; the checks are equally usable on plans built or
//! edited by hand.

use crate::cycles::Condensation;
use crate::error::PlanResult;
use crate::graph::FkGraph;
use crate::partition::group_is_deferrable;
use crate::plan::{MutationPlan, PlanSet, StageKind, StageRef};
use fk_core::{
    ColumnName, CycleColumnPolicy, GroupKey, PlanningConfig, SchemaGraph, SplitPolicy, Table,
    TableId,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable code of a validation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViolationCode {
    /// Every column appears in exactly one stage
    V001,
    /// The initial insert never sets a cycle-breaking column
    V002,
    /// Prerequisites point only at earlier stages and cover every target
    V003,
    /// Initial inserts do not depend on each other in a cycle
    V004,
    /// Splits and deferrals are justified
    V005,
    /// Deferred columns may be omitted on insert
    V006,
    /// Stage numbering, kinds and update keys
    V007,
    /// The schedule runs every stage once, after its prerequisites
    V008,
    /// Every table has exactly one plan
    V009,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::V001 => "V001",
            ViolationCode::V002 => "V002",
            ViolationCode::V003 => "V003",
            ViolationCode::V004 => "V004",
            ViolationCode::V005 => "V005",
            ViolationCode::V006 => "V006",
            ViolationCode::V007 => "V007",
            ViolationCode::V008 => "V008",
            ViolationCode::V009 => "V009",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub table: TableId,
    /// Offending column, if the check is column-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnName>,
    /// Offending stage index, if the check is stage-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    pub message: String,
}

impl Violation {
    fn new(code: ViolationCode, table: &TableId, message: impl Into<String>) -> Self {
        Self {
            code,
            table: table.clone(),
            column: None,
            stage: None,
            message: message.into(),
        }
    }

    fn column(mut self, column: &ColumnName) -> Self {
        self.column = Some(column.clone());
        self
    }

    fn stage(mut self, stage: usize) -> Self {
        self.stage = Some(stage);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.table, self.message)
    }
}

/// Schema facts the checks need, computed once.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    pub schema: &'a SchemaGraph,
    pub condensation: Condensation,
    pub options: PlanningConfig,
}

impl<'a> ValidationContext<'a> {
    pub fn new(schema: &'a SchemaGraph, options: PlanningConfig) -> PlanResult<Self> {
        let graph = FkGraph::build(schema)?;
        Ok(Self::from_condensation(
            schema,
            Condensation::from_graph(&graph),
            options,
        ))
    }

    pub(crate) fn from_condensation(
        schema: &'a SchemaGraph,
        condensation: Condensation,
        options: PlanningConfig,
    ) -> Self {
        Self {
            schema,
            condensation,
            options,
        }
    }

    /// Whether `target` lies in the same cycle as `table`
    fn is_breaking(&self, table: &TableId, target: &TableId) -> bool {
        self.condensation.is_in_cycle(table) && self.condensation.same_component(table, target)
    }
}

/// Validate one table's plan (checks V001-V003 and V005-V007).
pub fn validate_plan(plan: &MutationPlan, ctx: &ValidationContext<'_>) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_plan(plan, ctx, &mut violations);
    finish(violations)
}

/// Validate a whole plan set: every per-plan check plus V004, V008 and V009.
pub fn validate_plans(plans: &PlanSet, ctx: &ValidationContext<'_>) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_coverage(plans, ctx, &mut violations);
    for plan in plans.plans.values() {
        check_plan(plan, ctx, &mut violations);
    }
    check_insert_graph(plans, ctx, &mut violations);
    check_schedule(plans, &mut violations);
    finish(violations)
}

fn finish(violations: Vec<Violation>) -> Result<(), Vec<Violation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_plan(plan: &MutationPlan, ctx: &ValidationContext<'_>, out: &mut Vec<Violation>) {
    let Some(table) = ctx.schema.table(&plan.table) else {
        out.push(Violation::new(
            ViolationCode::V009,
            &plan.table,
            "plan for a table that is not in the schema",
        ));
        return;
    };

    check_numbering(plan, out);
    check_update_keys(plan, table, out);
    check_columns(plan, table, out);
    check_insert_columns(plan, table, ctx, out);
    check_prerequisites(plan, table, ctx, out);
    check_deferrals(plan, table, ctx, out);
}

/// V007
fn check_numbering(plan: &MutationPlan, out: &mut Vec<Violation>) {
    if plan.stages.is_empty() {
        out.push(Violation::new(
            ViolationCode::V007,
            &plan.table,
            "plan has no stages",
        ));
    }
    for (position, stage) in plan.stages.iter().enumerate() {
        if stage.index != position {
            out.push(
                Violation::new(
                    ViolationCode::V007,
                    &plan.table,
                    format!("stage at position {position} is numbered {}", stage.index),
                )
                .stage(stage.index),
            );
        }
        if stage.table != plan.table {
            out.push(
                Violation::new(
                    ViolationCode::V007,
                    &plan.table,
                    format!("stage {} belongs to {}", stage.index, stage.table),
                )
                .stage(stage.index),
            );
        }
        let expected = if position == 0 {
            StageKind::Insert
        } else {
            StageKind::Update
        };
        if stage.kind != expected {
            out.push(
                Violation::new(
                    ViolationCode::V007,
                    &plan.table,
                    format!("stage {} is an {} but must be an {expected}", stage.index, stage.kind),
                )
                .stage(stage.index),
            );
        }
        if position > 0 && stage.columns.is_empty() {
            out.push(
                Violation::new(
                    ViolationCode::V007,
                    &plan.table,
                    format!("update stage {} sets no columns", stage.index),
                )
                .stage(stage.index),
            );
        }
    }
}

/// V007: updates address their row by the full primary key
fn check_update_keys(plan: &MutationPlan, table: &Table, out: &mut Vec<Violation>) {
    for stage in plan.updates() {
        let message = if stage.key_columns.is_empty() {
            format!("update stage {} has no key columns", stage.index)
        } else if stage.key_columns != table.primary_key {
            format!(
                "update stage {} is keyed by [{}] instead of the primary key",
                stage.index,
                stage
                    .key_columns
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        } else {
            continue;
        };
        out.push(Violation::new(ViolationCode::V007, &plan.table, message).stage(stage.index));
    }
}

/// V001
fn check_columns(plan: &MutationPlan, table: &Table, out: &mut Vec<Violation>) {
    let mut seen: BTreeMap<&ColumnName, Vec<usize>> = BTreeMap::new();
    for stage in &plan.stages {
        for column in &stage.columns {
            seen.entry(column).or_default().push(stage.index);
        }
    }

    for column in &table.columns {
        match seen.remove(&column.name).as_deref() {
            None | Some([]) => out.push(
                Violation::new(ViolationCode::V001, &plan.table, "column is set by no stage")
                    .column(&column.name),
            ),
            Some([_]) => {}
            Some(stages) => out.push(
                Violation::new(
                    ViolationCode::V001,
                    &plan.table,
                    format!("column is set by stages {stages:?}"),
                )
                .column(&column.name),
            ),
        }
    }

    for (column, stages) in seen {
        out.push(
            Violation::new(ViolationCode::V001, &plan.table, "column does not exist")
                .column(column)
                .stage(stages[0]),
        );
    }
}

/// V002
fn check_insert_columns(
    plan: &MutationPlan,
    table: &Table,
    ctx: &ValidationContext<'_>,
    out: &mut Vec<Violation>,
) {
    let Some(insert) = plan.insert() else {
        return;
    };
    for group in table.foreign_key_groups() {
        if !ctx.is_breaking(&table.id, &group.target) {
            continue;
        }
        let pinnable = ctx.options.non_deferrable_cycle_columns == CycleColumnPolicy::Pin
            && !group_is_deferrable(table, &group);
        if pinnable {
            continue;
        }
        for column in group.columns.iter().filter(|c| insert.sets(c)) {
            out.push(
                Violation::new(
                    ViolationCode::V002,
                    &plan.table,
                    format!("initial insert sets cycle-breaking column referencing {}", group.target),
                )
                .column(column)
                .stage(insert.index),
            );
        }
    }
}

/// V003
fn check_prerequisites(
    plan: &MutationPlan,
    table: &Table,
    ctx: &ValidationContext<'_>,
    out: &mut Vec<Violation>,
) {
    let members: Vec<TableId> = ctx
        .condensation
        .cycle_of(&table.id)
        .map(|c| c.tables().to_vec())
        .unwrap_or_default();

    for stage in &plan.stages {
        let violation = |message: String| {
            Violation::new(ViolationCode::V003, &plan.table, message).stage(stage.index)
        };

        for prerequisite in stage
            .prerequisites
            .iter()
            .filter(|p| p.table == plan.table && p.index >= stage.index)
        {
            out.push(violation(format!(
                "stage {} cannot require {prerequisite}",
                stage.index
            )));
        }

        let mut required: BTreeSet<StageRef> = stage
            .columns
            .iter()
            .filter_map(|name| table.column(name).and_then(|c| c.target()))
            .filter(|target| !(stage.index == 0 && **target == table.id))
            .map(StageRef::insert)
            .collect();
        if stage.index > 0 {
            required.insert(StageRef::new(table.id.clone(), stage.index - 1));
            required.extend(members.iter().map(StageRef::insert));
        }
        for missing in required.difference(&stage.prerequisites) {
            out.push(violation(format!(
                "stage {} does not require {missing}",
                stage.index
            )));
        }
    }
}

/// V005 and V006
fn check_deferrals(
    plan: &MutationPlan,
    table: &Table,
    ctx: &ValidationContext<'_>,
    out: &mut Vec<Violation>,
) {
    let in_cycle = ctx.condensation.is_in_cycle(&table.id);
    let nullable_references = ctx.options.split_policy == SplitPolicy::NullableReferences;

    let groups = table.foreign_key_groups();
    let group_of = |column: &ColumnName| {
        groups
            .iter()
            .find(|g| g.columns.iter().any(|c| c == column))
    };

    let mut stage_of_group: BTreeMap<&GroupKey, usize> = BTreeMap::new();

    for stage in plan.updates() {
        for name in &stage.columns {
            let Some(column) = table.column(name) else {
                continue;
            };
            let Some(group) = group_of(name) else {
                let message = if in_cycle {
                    "deferred column is not a foreign key"
                } else {
                    "table is not in a cycle but its plan is split"
                };
                out.push(
                    Violation::new(ViolationCode::V005, &plan.table, message)
                        .column(name)
                        .stage(stage.index),
                );
                continue;
            };

            let breaking = ctx.is_breaking(&table.id, &group.target);
            let nullable_reference = nullable_references
                && group
                    .columns
                    .iter()
                    .all(|c| table.column(c).is_some_and(|c| c.nullable));
            if !breaking && !nullable_reference {
                let message = if in_cycle {
                    format!(
                        "deferred foreign key to {} does not break a cycle",
                        group.target
                    )
                } else {
                    "table is not in a cycle but its plan is split".to_string()
                };
                out.push(
                    Violation::new(ViolationCode::V005, &plan.table, message)
                        .column(name)
                        .stage(stage.index),
                );
            }

            if table.is_primary_key(name) || !column.can_be_omitted() {
                out.push(
                    Violation::new(
                        ViolationCode::V006,
                        &plan.table,
                        "deferred column cannot be omitted on insert",
                    )
                    .column(name)
                    .stage(stage.index),
                );
            }

            match stage_of_group.get(&group.key) {
                Some(&first) if first != stage.index => out.push(
                    Violation::new(
                        ViolationCode::V006,
                        &plan.table,
                        format!("foreign key {} is split across stages", group.key),
                    )
                    .column(name)
                    .stage(stage.index),
                ),
                Some(_) => {}
                None => {
                    stage_of_group.insert(&group.key, stage.index);
                }
            }
        }
    }

    // A group partly in the insert and partly deferred
    if let Some(insert) = plan.insert() {
        for (key, index) in &stage_of_group {
            let Some(group) = groups.iter().find(|g| &g.key == *key) else {
                continue;
            };
            for name in group.columns.iter().filter(|c| insert.sets(c)) {
                out.push(
                    Violation::new(
                        ViolationCode::V006,
                        &plan.table,
                        format!("foreign key {key} is split across stages 0 and {index}"),
                    )
                    .column(name)
                    .stage(0),
                );
            }
        }
    }
}

/// V009
fn check_coverage(plans: &PlanSet, ctx: &ValidationContext<'_>, out: &mut Vec<Violation>) {
    for id in ctx.schema.table_ids() {
        if !plans.plans.contains_key(id) {
            out.push(Violation::new(
                ViolationCode::V009,
                id,
                "table has no plan",
            ));
        }
    }
    for (key, plan) in &plans.plans {
        if *key != plan.table {
            out.push(Violation::new(
                ViolationCode::V009,
                key,
                format!("plan filed under {key} belongs to {}", plan.table),
            ));
        }
    }
}

/// V004: initial inserts, linked by the foreign keys they set
fn check_insert_graph(plans: &PlanSet, ctx: &ValidationContext<'_>, out: &mut Vec<Violation>) {
    let mut graph: DiGraph<&TableId, ()> = DiGraph::new();
    let mut nodes: BTreeMap<&TableId, NodeIndex> = BTreeMap::new();
    for id in plans.plans.keys() {
        nodes.insert(id, graph.add_node(id));
    }

    for (id, plan) in &plans.plans {
        let Some(insert) = plan.insert() else {
            continue;
        };
        let mut targets: BTreeSet<&TableId> = insert
            .prerequisites
            .iter()
            .filter(|p| p.index == 0 && p.table != *id)
            .map(|p| &p.table)
            .collect();
        if let Some(table) = ctx.schema.table(id) {
            targets.extend(
                insert
                    .columns
                    .iter()
                    .filter_map(|name| table.column(name).and_then(|c| c.target())),
            );
        }
        for target in targets {
            if let Some(&to) = nodes.get(target) {
                graph.add_edge(nodes[id], to, ());
            }
        }
    }

    for scc in tarjan_scc(&graph) {
        let self_loop = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
        if scc.len() < 2 && !self_loop {
            continue;
        }
        let mut members: Vec<&TableId> = scc.iter().map(|idx| graph[*idx]).collect();
        members.sort();
        let names: Vec<String> = members.iter().map(|t| t.to_string()).collect();
        out.push(Violation::new(
            ViolationCode::V004,
            members[0],
            format!("initial inserts depend on each other: [{}]", names.join(", ")),
        ));
    }
}

/// V008
fn check_schedule(plans: &PlanSet, out: &mut Vec<Violation>) {
    let mut position: BTreeMap<&StageRef, usize> = BTreeMap::new();
    for (idx, stage) in plans.schedule.iter().enumerate() {
        if plans.stage(stage).is_none() {
            out.push(
                Violation::new(
                    ViolationCode::V008,
                    &stage.table,
                    format!("schedule lists unknown stage {stage}"),
                )
                .stage(stage.index),
            );
        }
        if position.insert(stage, idx).is_some() {
            out.push(
                Violation::new(
                    ViolationCode::V008,
                    &stage.table,
                    format!("schedule lists {stage} more than once"),
                )
                .stage(stage.index),
            );
        }
    }

    for plan in plans.plans.values() {
        for stage in &plan.stages {
            let this = stage.stage_ref();
            let Some(&at) = position.get(&this) else {
                out.push(
                    Violation::new(
                        ViolationCode::V008,
                        &plan.table,
                        format!("schedule does not list {this}"),
                    )
                    .stage(stage.index),
                );
                continue;
            };
            for prerequisite in &stage.prerequisites {
                match position.get(prerequisite) {
                    Some(&before) if before < at => {}
                    Some(_) => out.push(
                        Violation::new(
                            ViolationCode::V008,
                            &plan.table,
                            format!("{this} is scheduled before its prerequisite {prerequisite}"),
                        )
                        .stage(stage.index),
                    ),
                    None => out.push(
                        Violation::new(
                            ViolationCode::V008,
                            &plan.table,
                            format!("{this} requires {prerequisite}, which is never scheduled"),
                        )
                        .stage(stage.index),
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;

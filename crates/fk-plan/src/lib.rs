//! fk-plan: foreign-key cycle resolution and mutation planning
//!
//! This crate finds the foreign-key cycles of a [`fk_core::SchemaGraph`],
//! splits the columns of cycle members into an initial insert and deferred
//! updates, orders every stage of every table, and validates the result.

pub mod cycles;
pub(crate) mod error;
pub(crate) mod graph;
pub mod partition;
pub mod plan;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use cycles::{find_cycles, Component, Condensation, Cycle};
pub use error::{PlanError, PlanResult};
pub use graph::FkGraph;
pub use partition::{
    classify_group, group_is_deferrable, partition, partition_cycle, CyclePartition,
    DeferReason, DeferredGroup, GroupClass, Partition,
};
pub use plan::{
    build_all_plans, build_plan, MutationPlan, MutationStage, PlanSet, StageKind, StageRef,
};
pub use validate::{validate_plan, validate_plans, ValidationContext, Violation, ViolationCode};

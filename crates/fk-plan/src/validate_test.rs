use super::*;
use crate::plan::{build_all_plans, MutationStage};
use crate::test_utils::{schema, table, tid};
use fk_core::DeferredLayout;

fn codes(violations: &[Violation]) -> BTreeSet<ViolationCode> {
    violations.iter().map(|v| v.code).collect()
}

fn col(name: &str) -> ColumnName {
    ColumnName::new(name)
}

fn employees() -> SchemaGraph {
    schema(vec![table("Employee")
        .column("Name")
        .nullable_fk("ManagerID", "Employee")
        .build()])
}

fn two_table_cycle() -> SchemaGraph {
    schema(vec![
        table("A").nullable_fk("BID", "B").build(),
        table("B").nullable_fk("AID", "A").build(),
    ])
}

fn catalog() -> SchemaGraph {
    schema(vec![
        table("Category").build(),
        table("Product").nullable_fk("CategoryID", "Category").build(),
    ])
}

fn plans_for(schema: &SchemaGraph) -> PlanSet {
    build_all_plans(schema, &PlanningConfig::default()).unwrap()
}

#[test]
fn test_built_plans_are_valid() {
    for schema in [employees(), two_table_cycle(), catalog()] {
        let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
        let plans = plans_for(&schema);
        assert!(validate_plans(&plans, &ctx).is_ok());
        for plan in plans.plans.values() {
            assert!(validate_plan(plan, &ctx).is_ok());
        }
    }
}

#[test]
fn test_missing_column_is_v001() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[0].columns.retain(|c| c != "Name");

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V001]));
    assert_eq!(violations[0].column, Some(col("Name")));
    assert_eq!(
        violations[0].to_string(),
        "[V001] dbo.Employee: column is set by no stage"
    );
}

#[test]
fn test_column_in_two_stages_is_v001() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[1].columns.push(col("Name"));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert!(codes(&violations).contains(&ViolationCode::V001));
}

#[test]
fn test_unknown_column_is_v001() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[0].columns.push(col("Salary"));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V001]));
    assert_eq!(violations[0].stage, Some(0));
}

#[test]
fn test_breaking_column_in_insert_is_v002() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages.truncate(1);
    plan.stages[0].columns.push(col("ManagerID"));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert!(codes(&violations).contains(&ViolationCode::V002));
    let v002 = violations
        .iter()
        .find(|v| v.code == ViolationCode::V002)
        .unwrap();
    assert_eq!(v002.column, Some(col("ManagerID")));
}

#[test]
fn test_pinned_column_in_insert_is_accepted() {
    let schema = schema(vec![
        table("A").fk("BID", "B").build(),
        table("B").nullable_fk("AID", "A").build(),
    ]);
    let options = PlanningConfig {
        non_deferrable_cycle_columns: CycleColumnPolicy::Pin,
        ..PlanningConfig::default()
    };
    let plans = build_all_plans(&schema, &options).unwrap();
    let ctx = ValidationContext::new(&schema, options).unwrap();
    assert!(validate_plans(&plans, &ctx).is_ok());

    // The same plans break the rules once pinning is off.
    let strict = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let violations = validate_plans(&plans, &strict).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V002]));
}

#[test]
fn test_self_prerequisite_is_v003() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[0]
        .prerequisites
        .insert(StageRef::new(tid("Employee"), 1));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V003]));
    assert_eq!(violations[0].stage, Some(0));
}

#[test]
fn test_prerequisite_on_later_stage_is_v003() {
    let schema = schema(vec![table("Node")
        .nullable_fk("LeftID", "Node")
        .nullable_fk("RightID", "Node")
        .build()]);
    let options = PlanningConfig {
        deferred_layout: DeferredLayout::PerGroup,
        ..PlanningConfig::default()
    };
    let ctx = ValidationContext::new(&schema, options).unwrap();
    let plans = build_all_plans(&schema, &options).unwrap();
    let mut plan = plans.plans[&tid("Node")].clone();
    assert_eq!(plan.stage_count(), 3);
    assert!(validate_plan(&plan, &ctx).is_ok());

    plan.stages[1]
        .prerequisites
        .insert(StageRef::new(tid("Node"), 2));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V003]));
    assert_eq!(violations[0].stage, Some(1));
    assert!(violations[0].message.contains("dbo.Node#2"));
}

#[test]
fn test_update_not_waiting_for_cycle_is_v003() {
    let schema = two_table_cycle();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("A")].clone();
    plan.stages[1].prerequisites.remove(&StageRef::insert(&tid("B")));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V003]));
    assert!(violations[0].message.contains("dbo.B#0"));
}

#[test]
fn test_mutually_dependent_inserts_are_v004() {
    let schema = two_table_cycle();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plans = plans_for(&schema);
    for (id, other) in [("A", "B"), ("B", "A")] {
        let plan = plans.plans.get_mut(&tid(id)).unwrap();
        let deferred = plan.stages.pop().unwrap();
        plan.stages[0].columns.extend(deferred.columns);
        plan.stages[0].prerequisites.insert(StageRef::insert(&tid(other)));
    }
    plans.schedule.retain(|s| s.index == 0);

    let violations = validate_plans(&plans, &ctx).unwrap_err();
    let found = codes(&violations);
    assert!(found.contains(&ViolationCode::V004));
    let v004 = violations
        .iter()
        .find(|v| v.code == ViolationCode::V004)
        .unwrap();
    assert_eq!(v004.table, tid("A"));
    assert!(v004.message.contains("[dbo.A, dbo.B]"));
}

fn split_product(plans: &mut PlanSet) {
    let plan = plans.plans.get_mut(&tid("Product")).unwrap();
    plan.stages[0].columns.retain(|c| c != "CategoryID");
    plan.stages.push(MutationStage {
        table: tid("Product"),
        index: 1,
        kind: StageKind::Update,
        columns: vec![col("CategoryID")],
        key_columns: vec![col("Id")],
        generated: Vec::new(),
        groups: vec![GroupKey::Column(col("CategoryID"))],
        prerequisites: [
            StageRef::insert(&tid("Product")),
            StageRef::insert(&tid("Category")),
        ]
        .into(),
    });
    plans.schedule.push(StageRef::new(tid("Product"), 1));
}

#[test]
fn test_split_outside_cycle_is_v005() {
    let schema = catalog();
    let mut plans = plans_for(&schema);
    split_product(&mut plans);

    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let violations = validate_plans(&plans, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V005]));
    assert_eq!(
        violations[0].message,
        "table is not in a cycle but its plan is split"
    );

    let lenient = ValidationContext::new(
        &schema,
        PlanningConfig {
            split_policy: SplitPolicy::NullableReferences,
            ..PlanningConfig::default()
        },
    )
    .unwrap();
    assert!(validate_plans(&plans, &lenient).is_ok());
}

#[test]
fn test_deferred_not_null_column_is_v006() {
    let schema = schema(vec![
        table("Category").build(),
        table("Product").fk("CategoryID", "Category").build(),
    ]);
    let mut plans = plans_for(&schema);
    split_product(&mut plans);

    let ctx = ValidationContext::new(
        &schema,
        PlanningConfig {
            split_policy: SplitPolicy::NullableReferences,
            ..PlanningConfig::default()
        },
    )
    .unwrap();
    let violations = validate_plans(&plans, &ctx).unwrap_err();
    let found = codes(&violations);
    assert!(found.contains(&ViolationCode::V006));
    // Not a nullable reference either
    assert!(found.contains(&ViolationCode::V005));
}

#[test]
fn test_composite_key_split_across_stages_is_v006() {
    let schema = schema(vec![
        table("Shipment")
            .group_fk("WarehouseID", "Location", "FK_Loc")
            .group_fk("BinID", "Location", "FK_Loc")
            .build(),
        table("Location").nullable_fk("LastShipmentID", "Shipment").build(),
    ]);
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Shipment")].clone();
    plan.stages[1].columns.retain(|c| c != "BinID");
    plan.stages[0].columns.push(col("BinID"));

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    let found = codes(&violations);
    assert!(found.contains(&ViolationCode::V006));
    assert!(found.contains(&ViolationCode::V002));
}

#[test]
fn test_wrong_stage_kind_is_v007() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[1].kind = StageKind::Insert;

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V007]));
    assert_eq!(violations[0].stage, Some(1));
}

#[test]
fn test_gap_in_stage_numbers_is_v007() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[1].index = 2;

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert!(codes(&violations).contains(&ViolationCode::V007));
}

#[test]
fn test_update_without_key_columns_is_v007() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[1].key_columns.clear();

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V007]));
    assert_eq!(violations[0].stage, Some(1));
    assert!(violations[0].message.contains("no key columns"));
}

#[test]
fn test_update_keyed_by_other_columns_is_v007() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plan = plans_for(&schema).plans[&tid("Employee")].clone();
    plan.stages[1].key_columns = vec![col("Name")];

    let violations = validate_plan(&plan, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V007]));
    assert!(violations[0].message.contains("[Name]"));
}

#[test]
fn test_schedule_out_of_order_is_v008() {
    let schema = two_table_cycle();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plans = plans_for(&schema);
    plans.schedule.reverse();

    let violations = validate_plans(&plans, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V008]));
}

#[test]
fn test_schedule_missing_and_duplicate_stages_are_v008() {
    let schema = employees();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();

    let mut missing = plans_for(&schema);
    missing.schedule.pop();
    let violations = validate_plans(&missing, &ctx).unwrap_err();
    assert_eq!(codes(&violations), BTreeSet::from([ViolationCode::V008]));

    let mut duplicate = plans_for(&schema);
    duplicate.schedule.push(StageRef::insert(&tid("Employee")));
    let violations = validate_plans(&duplicate, &ctx).unwrap_err();
    assert!(violations
        .iter()
        .any(|v| v.code == ViolationCode::V008 && v.message.contains("more than once")));
}

#[test]
fn test_missing_plan_is_v009() {
    let schema = catalog();
    let ctx = ValidationContext::new(&schema, PlanningConfig::default()).unwrap();
    let mut plans = plans_for(&schema);
    plans.plans.remove(&tid("Category"));
    plans.schedule.retain(|s| s.table != tid("Category"));

    let violations = validate_plans(&plans, &ctx).unwrap_err();
    let v009: Vec<&Violation> = violations
        .iter()
        .filter(|v| v.code == ViolationCode::V009)
        .collect();
    assert_eq!(v009.len(), 1);
    assert_eq!(v009[0].table, tid("Category"));
}

#[test]
fn test_violation_serializes_without_empty_fields() {
    let violation = Violation::new(ViolationCode::V009, &tid("Category"), "table has no plan");
    let json = serde_json::to_value(&violation).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "code": "V009",
            "table": "dbo.Category",
            "message": "table has no plan",
        })
    );
}

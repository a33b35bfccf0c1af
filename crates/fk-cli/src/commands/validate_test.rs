use super::*;
use fk_core::{schema_graph_from_yaml, Config, CycleColumnPolicy};

const TWO_BROKEN_CYCLES: &str = r#"
tables:
  - name: Department
    primary_key: [Id]
    columns:
      - { name: Id, identity: true }
      - { name: ManagerID, references: Employee }
  - name: Employee
    primary_key: [Id]
    columns:
      - { name: Id, identity: true }
      - { name: DepartmentID, references: Department }
  - name: Node
    primary_key: [Id]
    columns:
      - { name: Id, identity: true }
      - { name: ParentID, references: Node }
"#;

const SELF_REFERENCE: &str = r#"
tables:
  - name: Employee
    primary_key: [Id]
    columns:
      - { name: Id, identity: true }
      - { name: ManagerID, nullable: true, references: Employee }
"#;

fn graph(yaml: &str) -> SchemaGraph {
    schema_graph_from_yaml(yaml, &Config::default()).unwrap()
}

#[test]
fn test_valid_schema_has_no_issues() {
    let schema = graph(SELF_REFERENCE);
    let issues = collect_issues(&schema, &PlanningConfig::default(), false).unwrap();
    assert!(issues.is_empty());
}

#[test]
fn test_every_unsatisfiable_cycle_is_reported() {
    let schema = graph(TWO_BROKEN_CYCLES);
    let issues = collect_issues(&schema, &PlanningConfig::default(), false).unwrap();
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.code == "P001"));

    let tables: Vec<_> = issues.iter().filter_map(|i| i.table.as_deref()).collect();
    assert!(tables.contains(&"dbo.Node"));
}

#[test]
fn test_pin_does_not_rescue_self_reference() {
    let schema = graph(TWO_BROKEN_CYCLES);
    let options = PlanningConfig {
        non_deferrable_cycle_columns: CycleColumnPolicy::Pin,
        ..PlanningConfig::default()
    };
    let issues = collect_issues(&schema, &options, false).unwrap();
    assert!(issues
        .iter()
        .any(|i| i.table.as_deref() == Some("dbo.Node")));
}

#[test]
fn test_issue_display() {
    let issue = plan_error_issue(PlanError::UnsatisfiableCycle {
        table: "dbo.A".to_string(),
        columns: "BID".to_string(),
        cycle: "[dbo.A, dbo.B]".to_string(),
    });
    assert_eq!(
        issue.to_string(),
        "[P001] dbo.A: column(s) BID cannot be left NULL on insert (cycle: [dbo.A, dbo.B])"
    );

    let other = plan_error_issue(PlanError::UnknownTable {
        table: "dbo.X".to_string(),
    });
    assert_eq!(other.code, "P000");
    assert!(other.to_string().contains("Unknown table"));
}

#[test]
fn test_issue_json_skips_missing_table() {
    let issue = ValidationIssue {
        code: "P002".to_string(),
        table: None,
        message: "x".to_string(),
    };
    let json = serde_json::to_value(&issue).unwrap();
    assert!(json.get("table").is_none());
}

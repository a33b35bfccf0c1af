//! Validate command implementation

use anyhow::Result;
use fk_core::{PlanningConfig, SchemaGraph};
use fk_plan::{
    build_all_plans, find_cycles, partition_cycle, validate_plans, PlanError, ValidationContext,
};
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, ValidateArgs};
use crate::commands::common::{load_project, print_json, ExitCode};

/// A single validation issue
#[derive(Debug, Serialize)]
struct ValidationIssue {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.table {
            Some(table) => write!(f, "[{}] {}: {}", self.code, table, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Execute the validate command
pub fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let issues = collect_issues(&project.schema, &project.config.planning, global.verbose)?;

    match args.output {
        OutputFormat::Json => print_json(&issues)?,
        OutputFormat::Table => {
            let label = project.config.name.as_deref().unwrap_or("schema");
            println!("Validating {}: {} tables\n", label, project.schema.len());
            for issue in &issues {
                println!("{}", issue);
            }
            if !issues.is_empty() {
                println!();
            }
            if issues.is_empty() {
                println!("Validation passed: every table can be planned");
            } else {
                println!("Validation failed: {} issue(s)", issues.len());
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ExitCode(1).into())
    }
}

/// Report every unsatisfiable cycle, then check the full plan set.
fn collect_issues(
    schema: &SchemaGraph,
    options: &PlanningConfig,
    verbose: bool,
) -> Result<Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let cycles = find_cycles(schema)?;
    if verbose {
        eprintln!("[verbose] Checking {} cycle(s)", cycles.len());
    }
    for cycle in &cycles {
        if let Err(err) = partition_cycle(schema, cycle, options) {
            issues.push(plan_error_issue(err));
        }
    }
    if !issues.is_empty() {
        return Ok(issues);
    }

    let plans = match build_all_plans(schema, options) {
        Ok(plans) => plans,
        Err(err) => {
            issues.push(plan_error_issue(err));
            return Ok(issues);
        }
    };
    if verbose {
        eprintln!(
            "[verbose] Built {} plans with {} stages",
            plans.plans.len(),
            plans.stage_count()
        );
    }

    let ctx = ValidationContext::new(schema, *options)?;
    if let Err(violations) = validate_plans(&plans, &ctx) {
        issues.extend(violations.into_iter().map(|v| ValidationIssue {
            code: v.code.to_string(),
            table: Some(v.table.to_string()),
            message: v.message,
        }));
    }
    Ok(issues)
}

fn plan_error_issue(err: PlanError) -> ValidationIssue {
    match err {
        PlanError::UnsatisfiableCycle {
            table,
            columns,
            cycle,
        } => ValidationIssue {
            code: "P001".to_string(),
            table: Some(table),
            message: format!(
                "column(s) {} cannot be left NULL on insert (cycle: {})",
                columns, cycle
            ),
        },
        PlanError::InternalPlanInconsistency { violations } => ValidationIssue {
            code: "P002".to_string(),
            table: None,
            message: violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        },
        other => ValidationIssue {
            code: "P000".to_string(),
            table: None,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;

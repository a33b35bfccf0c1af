//! Plan command implementation

use anyhow::{Context, Result};
use fk_core::TableId;
use fk_plan::{build_all_plans, build_plan, MutationPlan, MutationStage, PlanSet, StageKind};

use crate::cli::{GlobalArgs, OutputFormat, PlanArgs};
use crate::commands::common::{join_or_dash, load_project, print_json, print_table};

/// Execute the plan command
pub fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let options = project.config.planning;

    if let Some(table) = &args.table {
        let id = TableId::parse(table, &project.config.default_schema)
            .with_context(|| format!("Invalid table name '{}'", table))?;
        let plan = build_plan(&project.schema, &id, &options)
            .with_context(|| format!("Failed to plan {}", id))?;
        return match args.output {
            OutputFormat::Table => {
                print_table(&STAGE_HEADERS, &stage_rows(&plan));
                Ok(())
            }
            OutputFormat::Json => print_json(&plan),
        };
    }

    let plans = build_all_plans(&project.schema, &options).context("Failed to plan mutations")?;
    if global.verbose {
        eprintln!(
            "[verbose] {} cycle(s), {} of {} tables split",
            plans.cycles.len(),
            plans.split_plans().count(),
            plans.plans.len()
        );
    }

    match args.output {
        OutputFormat::Table => print_plan_set(&plans),
        OutputFormat::Json => print_json(&plans)?,
    }
    Ok(())
}

const STAGE_HEADERS: [&str; 5] = ["TABLE", "STAGE", "KIND", "COLUMNS", "REQUIRES"];

fn stage_rows(plan: &MutationPlan) -> Vec<Vec<String>> {
    plan.stages.iter().map(stage_row).collect()
}

fn stage_row(stage: &MutationStage) -> Vec<String> {
    let kind = match stage.kind {
        StageKind::Insert => "insert".to_string(),
        StageKind::Update => format!("update by {}", join_or_dash(&stage.key_columns)),
    };
    vec![
        stage.table.to_string(),
        stage.index.to_string(),
        kind,
        join_or_dash(&stage.columns),
        join_or_dash(&stage.prerequisites),
    ]
}

fn print_plan_set(plans: &PlanSet) {
    let rows: Vec<Vec<String>> = plans
        .schedule
        .iter()
        .enumerate()
        .filter_map(|(step, stage_ref)| {
            let mut row = stage_row(plans.stage(stage_ref)?);
            row.insert(0, (step + 1).to_string());
            Some(row)
        })
        .collect();

    let mut headers = vec!["STEP"];
    headers.extend(STAGE_HEADERS);
    print_table(&headers, &rows);

    println!();
    println!(
        "{} tables, {} stages, {} split across {} cycle(s)",
        plans.plans.len(),
        plans.stage_count(),
        plans.split_plans().count(),
        plans.cycles.len()
    );
}

//! Cycles command implementation

use anyhow::{Context, Result};
use fk_core::SchemaGraph;
use fk_plan::{find_cycles, Cycle};
use serde::Serialize;

use crate::cli::{CyclesArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{join_or_dash, load_project, print_json, print_table};

/// Cycle information for display
#[derive(Debug, Serialize)]
struct CycleInfo {
    tables: Vec<String>,
    self_reference: bool,
    /// `schema.table.column -> schema.table` for every in-cycle reference
    references: Vec<String>,
}

/// Execute the cycles command
pub fn execute(args: &CyclesArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let cycles = find_cycles(&project.schema).context("Failed to detect cycles")?;
    let infos: Vec<CycleInfo> = cycles
        .iter()
        .map(|cycle| cycle_info(&project.schema, cycle))
        .collect();

    match args.output {
        OutputFormat::Table => print_cycles(&infos),
        OutputFormat::Json => print_json(&infos)?,
    }
    Ok(())
}

fn cycle_info(schema: &SchemaGraph, cycle: &Cycle) -> CycleInfo {
    let references = cycle
        .tables()
        .iter()
        .filter_map(|id| schema.table(id))
        .flat_map(|table| {
            table.foreign_key_columns().filter_map(move |column| {
                let target = column.target()?;
                cycle
                    .contains(target)
                    .then(|| format!("{}.{} -> {}", table.id, column.name, target))
            })
        })
        .collect();

    CycleInfo {
        tables: cycle.tables().iter().map(|t| t.to_string()).collect(),
        self_reference: cycle.is_self_reference(),
        references,
    }
}

fn print_cycles(infos: &[CycleInfo]) {
    if infos.is_empty() {
        println!("No foreign-key cycles found");
        return;
    }

    let rows: Vec<Vec<String>> = infos
        .iter()
        .enumerate()
        .map(|(idx, info)| {
            vec![
                (idx + 1).to_string(),
                join_or_dash(&info.tables),
                join_or_dash(&info.references),
            ]
        })
        .collect();
    print_table(&["CYCLE", "TABLES", "REFERENCES"], &rows);

    let self_references = infos.iter().filter(|i| i.self_reference).count();
    println!();
    println!(
        "{} cycle(s), {} self-referencing table(s)",
        infos.len(),
        self_references
    );
}

#[cfg(test)]
#[path = "cycles_test.rs"]
mod tests;

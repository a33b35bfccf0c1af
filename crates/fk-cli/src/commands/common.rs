//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use fk_core::{load_schema_graph, Config, SchemaGraph};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main exits without printing it.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// A loaded project: configuration plus the frozen schema graph
pub(crate) struct Project {
    pub config: Config,
    pub schema: SchemaGraph,
}

/// Load the configuration selected by the global flags.
///
/// `--config` must point at an existing file. Without it the project
/// directory is searched for `fkplan.yml`/`fkplan.yaml`, and defaults are
/// used when neither exists.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    if let Some(path) = &global.config {
        return Config::load(Path::new(path))
            .with_context(|| format!("Failed to load config '{}'", path));
    }

    let dir = Path::new(&global.project_dir);
    let has_config = ["fkplan.yml", "fkplan.yaml"]
        .iter()
        .any(|name| dir.join(name).exists());
    if has_config {
        return Config::load_from_dir(dir).context("Failed to load project config");
    }

    if global.verbose {
        eprintln!(
            "[verbose] No fkplan.yml in {}, using default configuration",
            dir.display()
        );
    }
    Ok(Config::default())
}

/// Snapshot files to load: `--schema` flags, else the config's `schema_paths`
pub(crate) fn schema_paths(global: &GlobalArgs, config: &Config) -> Vec<PathBuf> {
    if global.schema.is_empty() {
        config.schema_paths_absolute(Path::new(&global.project_dir))
    } else {
        global.schema.iter().map(PathBuf::from).collect()
    }
}

/// Load configuration and schema snapshots.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let config = load_config(global)?;
    let paths = schema_paths(global, &config);

    if global.verbose {
        for path in &paths {
            eprintln!("[verbose] Loading schema snapshot {}", path.display());
        }
    }

    let schema = load_schema_graph(&paths, &config).context("Failed to load schema")?;
    if schema.is_empty() {
        log::warn!("No tables found in {} schema snapshot(s)", paths.len());
    }

    if global.verbose {
        eprintln!(
            "[verbose] Loaded {} tables (split_policy: {}, deferred_layout: {}, non_deferrable_cycle_columns: {})",
            schema.len(),
            config.planning.split_policy,
            config.planning.deferred_layout,
            config.planning.non_deferrable_cycle_columns
        );
    }

    Ok(Project { config, schema })
}

// ---------------------------------------------------------------------------
// Output utilities
// ---------------------------------------------------------------------------

/// Calculate column widths for a table given headers and row data.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a formatted table to stdout.
///
/// Columns are left-aligned and separated by two spaces, with a dashed line
/// under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}

/// Print any serializable value as pretty JSON
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Join names for a table cell, `-` when empty
pub(crate) fn join_or_dash<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let parts: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;

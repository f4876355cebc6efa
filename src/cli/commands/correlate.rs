//! Correlate command implementation.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::cli::DatasetArgs;
use crate::cli::commands::{open_side, runtime};
use crate::config::load_config;
use crate::correlate::CorrelationStats;
use crate::error::Result;
use crate::task::MigrationJob;

#[derive(Serialize)]
struct TaskOutput<'a> {
    object: &'a str,
    external_id: &'a str,
    source_records: usize,
    target_records: usize,
    source_collisions: usize,
    target_collisions: usize,
    stats: CorrelationStats,
}

/// Execute the correlate command.
///
/// # Errors
///
/// Returns an error if the config, a dataset or an index cannot be loaded.
pub fn execute(args: &DatasetArgs, config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let objects = config.select(args.object.as_deref())?;
    let source = open_side(&args.source)?;
    let target = open_side(&args.target)?;

    let job = runtime()?.block_on(MigrationJob::load(&source, &target, &objects))?;

    let outputs: Vec<TaskOutput<'_>> = job
        .tasks()
        .iter()
        .map(|task| TaskOutput {
            object: task.object(),
            external_id: &task.config().external_id,
            source_records: task.source().len(),
            target_records: task.target().len(),
            source_collisions: task.source().collisions(),
            target_collisions: task.target().collisions(),
            stats: task.correlation().stats(),
        })
        .collect();

    if json {
        let payload = serde_json::to_string(&outputs)?;
        println!("{payload}");
        return Ok(());
    }

    for output in &outputs {
        println!(
            "{} {} (by {})",
            "Correlation:".bold().underline(),
            output.object.bold(),
            output.external_id
        );
        println!("  Source records: {}", output.source_records);
        println!("  Target records: {}", output.target_records);
        println!("  Matched:        {}", output.stats.matched.to_string().green());
        println!("  Unmatched:      {}", output.stats.unmatched);
        println!("  No external id: {}", output.stats.without_external_id);
        if output.stats.shared_targets > 0 {
            println!("  {} {}", "Shared targets:".yellow(), output.stats.shared_targets);
        }
        if output.source_collisions + output.target_collisions > 0 {
            println!(
                "  {} {} source, {} target",
                "Duplicate external ids:".yellow(),
                output.source_collisions,
                output.target_collisions
            );
        }
    }
    Ok(())
}

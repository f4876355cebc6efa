//! Files command implementations (plan and sync).

use std::path::PathBuf;

use tracing::warn;

use crate::addon::{ExportFiles, FilesReport, RunSettings};
use crate::cli::{DatasetArgs, FilesCommands};
use crate::cli::commands::{open_side, runtime};
use crate::config::load_config;
use crate::error::{Error, Result};
use crate::sync::{print_plan, print_result, AbortSignal};
use crate::task::MigrationJob;

/// Execute files commands.
pub fn execute(
    command: &FilesCommands,
    config_path: Option<&PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    match command {
        FilesCommands::Plan(args) => run(args, config_path, true, json),
        FilesCommands::Sync(args) => run(args, config_path, dry_run, json),
    }
}

fn run(args: &DatasetArgs, config_path: Option<&PathBuf>, dry_run: bool, json: bool) -> Result<()> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let objects = config.select(args.object.as_deref())?;
    let source = open_side(&args.source)?;
    let target = open_side(&args.target)?;

    let abort = AbortSignal::new();
    let settings = RunSettings::from_config(&config, dry_run, abort.clone());

    let rt = runtime()?;
    let reports = rt.block_on(async {
        let signal = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing running batches");
                signal.abort();
            }
        });

        let job = MigrationJob::load(&source, &target, &objects).await?;
        let addon = ExportFiles::new(&source, &target, &job).with_settings(settings);

        let mut reports = Vec::with_capacity(objects.len());
        for object in &objects {
            if abort.is_aborted() {
                break;
            }
            reports.push(addon.execute(&object.object).await?);
        }
        Ok::<_, Error>(reports)
    })?;

    print_reports(&reports, dry_run, json)?;

    let pending: usize = reports.iter().filter_map(|r| r.result.as_ref()).map(|r| r.aborted).sum();
    if abort.is_aborted() {
        return Err(Error::Aborted { pending });
    }
    Ok(())
}

fn print_reports(reports: &[FilesReport], dry_run: bool, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "dry_run": dry_run,
            "objects": reports,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No objects processed.");
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        match &report.result {
            Some(result) => print_result(&report.object, result),
            None => print_plan(&report.object, &report.plan),
        }
    }

    if dry_run {
        println!();
        println!("Dry run: nothing was written.");
    }
    Ok(())
}

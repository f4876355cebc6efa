//! Human-readable plan and result display.

use colored::Colorize;

use crate::sync::types::{ExecutionResult, Plan, PlanNotice};

/// One-line explanation of an early exit.
#[must_use]
pub fn notice_text(notice: PlanNotice) -> String {
    match notice {
        PlanNotice::UnsupportedTarget => "target is file-backed, files were not synchronized".to_string(),
        PlanNotice::OperationNotPermitted(operation) => {
            format!("operation {operation} does not allow file synchronization")
        }
        PlanNotice::NothingToSync => "no source record has files".to_string(),
    }
}

/// Print a plan, action by action.
pub fn print_plan(object: &str, plan: &Plan) {
    println!("{} {}", "Files plan:".bold().underline(), object.bold());
    println!("  Operation: {}", plan.operation);

    if let Some(notice) = plan.notice {
        println!("  {} {}", "Note:".yellow().bold(), notice_text(notice));
    }

    let summary = plan.summary();
    if summary.total() == 0 {
        println!("  {}", "Nothing to do".dimmed());
        return;
    }

    println!();
    for action in &plan.actions {
        let kind = match action.kind() {
            "create" => "create".green(),
            "update" => "update".blue(),
            "delete" => "delete".red(),
            other => other.dimmed(),
        };
        println!("  {kind:<8} {}", action.to_string().dimmed());
    }

    println!();
    println!(
        "  {} create, {} update, {} skip, {} delete",
        summary.create.to_string().green(),
        summary.update.to_string().blue(),
        summary.skip,
        summary.delete.to_string().red()
    );
}

/// Print the outcome of applying a plan.
pub fn print_result(object: &str, result: &ExecutionResult) {
    let status = if result.is_clean() { "✓".green() } else { "!".yellow() };
    println!("{status} {} {}", "Files synchronized:".bold(), object.bold());
    println!("  Created: {}", result.created);
    println!("  Updated: {}", result.updated);
    println!("  Skipped: {}", result.skipped);
    println!("  Deleted: {}", result.deleted);

    if result.aborted > 0 {
        println!("  {} {}", "Aborted:".yellow().bold(), result.aborted);
    }
    if !result.failures.is_empty() {
        println!("  {} {}", "Failed:".red().bold(), result.failed());
        for failure in &result.failures {
            println!("    {} [{}] {}", failure.action, failure.code, failure.message.dimmed());
        }
    }
}

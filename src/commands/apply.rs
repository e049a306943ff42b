//! `steward apply` - one reconciliation pass over the manifest

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{
    EngineOptions, FailureReason, NoProgress, OutcomeStatus, ResourceSpec, RunReport, SkipReason,
    reconcile,
};
use std::sync::Arc;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config;
use crate::invoke::{SystemRunner, ToolRunner};
use crate::privilege;
use crate::progress::SpinnerProgress;
use crate::ui;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<bool> {
    let manifest = super::load_manifest(args.config)?;
    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let mut specs = config::build_specs(&manifest, &runner);

    // --json owns stdout; everything conversational is suppressed with it
    let chatty = text_chrome_enabled(ctx.quiet, args.json);

    if specs.is_empty() {
        if chatty {
            ui::info("Manifest declares no resources; nothing to do");
        }
        return Ok(true);
    }

    if args.user_only {
        let (kept, removed) = config::prune_for_user_only(specs);
        specs = kept;
        if !removed.is_empty() && chatty {
            ui::warn(&format!(
                "Skipping {} root-level resources (--user-only): {}",
                removed.len(),
                removed
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }

    let privilege = privilege::detect();
    if !privilege.elevated && specs.iter().any(ResourceSpec::needs_root) {
        bail!("System operations require root. Re-run with sudo or use --user-only");
    }
    if privilege.elevated {
        if let Some(user) = privilege::real_user() {
            log::info!("elevated run on behalf of {user}");
        }
    }

    // Read-only preview; also surfaces config errors before anything runs
    let overview = super::probe_overview(&specs)?;
    let pending: Vec<_> = overview.iter().filter(|o| !o.converged).collect();

    if pending.is_empty() {
        if !args.json {
            ui::success("Everything already converged");
        }
    } else if chatty {
        ui::section("Pending changes");
        for item in &pending {
            println!(
                "  {} {}: {} → {}",
                "~".yellow(),
                item.id,
                item.observed.dimmed(),
                item.desired
            );
        }
    }

    if args.dry_run {
        if !args.json {
            println!();
            ui::info("Dry run - no changes made");
        }
        return Ok(true);
    }

    if !pending.is_empty() && !args.yes && !confirm_proceed()? {
        println!();
        ui::error("Aborted");
        return Ok(false);
    }

    let opts = EngineOptions {
        halt_on_failure: args.halt,
    };

    let report = if ctx.quiet || args.json {
        reconcile(&specs, &privilege, &opts, &mut NoProgress)?
    } else {
        reconcile(&specs, &privilege, &opts, &mut SpinnerProgress::new())?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_report(&report, ctx.verbose > 0);
    }

    Ok(report.overall_success())
}

/// Whether informational messages may share stdout with the command output
fn text_chrome_enabled(quiet: bool, json: bool) -> bool {
    !quiet && !json
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print the per-resource outcomes and a closing summary
pub fn render_report(report: &RunReport, verbose: bool) {
    let counts = report.counts();

    println!();
    for outcome in &report.outcomes {
        match &outcome.status {
            OutcomeStatus::Unchanged => {
                println!("  {} {} {}", "○".dimmed(), outcome.id, "unchanged".dimmed());
            }
            OutcomeStatus::Converged => {
                println!("  {} {} {}", "✓".green(), outcome.id, "converged".green());
                if verbose {
                    if let (Some(start), Some(end)) = (&outcome.start, &outcome.end) {
                        println!("      {}", format!("{start} → {end}").dimmed());
                    }
                }
            }
            OutcomeStatus::Failed(reason) => {
                println!(
                    "  {} {} {}",
                    "✗".red(),
                    outcome.id,
                    failure_text(reason).red()
                );
            }
            OutcomeStatus::Skipped(reason) => {
                println!(
                    "  {} {} {}",
                    "⊘".yellow(),
                    outcome.id,
                    skip_text(reason).yellow()
                );
            }
        }
    }

    println!();
    if report.overall_success() {
        println!("  {} System converged", "✓".green().bold());
    } else {
        println!("  {} Run completed with problems", "⚠".yellow().bold());
    }
    if counts.unchanged > 0 {
        println!("    • {} already correct", counts.unchanged);
    }
    if counts.converged > 0 {
        println!("    • {} fixed", counts.converged);
    }
    if counts.skipped > 0 {
        println!("    • {} skipped", counts.skipped);
    }
    if counts.failed > 0 {
        println!("    • {} {}", counts.failed, "failed".red());
    }
}

fn failure_text(reason: &FailureReason) -> String {
    match reason {
        FailureReason::InsufficientPrivilege => "requires root".to_string(),
        FailureReason::Probe { message } => format!("probe failed: {message}"),
        FailureReason::Apply { message } => format!("apply failed: {message}"),
        FailureReason::Verification { observed } => {
            format!("applied but still observed '{observed}'")
        }
    }
}

fn skip_text(reason: &SkipReason) -> String {
    match reason {
        SkipReason::DependencyFailed { dependency } => {
            format!("skipped: prerequisite {dependency} failed")
        }
        SkipReason::RunHalted => "skipped: run halted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_suppresses_text_chrome() {
        // --json must never interleave warnings with the report on stdout
        assert!(!text_chrome_enabled(false, true));
        assert!(!text_chrome_enabled(true, true));
    }

    #[test]
    fn quiet_suppresses_text_chrome() {
        assert!(!text_chrome_enabled(true, false));
        assert!(text_chrome_enabled(false, false));
    }

    #[test]
    fn failure_text_names_the_reason() {
        assert_eq!(
            failure_text(&FailureReason::InsufficientPrivilege),
            "requires root"
        );
        assert!(
            failure_text(&FailureReason::Apply {
                message: "brew exploded".into()
            })
            .contains("brew exploded")
        );
    }
}

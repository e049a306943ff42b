//! `steward status` - current state vs the manifest, read-only

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::Context;
use crate::cli::StatusArgs;
use crate::config;
use crate::invoke::{SystemRunner, ToolRunner};
use crate::ui;

pub fn status(ctx: &Context, args: StatusArgs) -> Result<()> {
    let manifest = super::load_manifest(args.config)?;
    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let specs = config::build_specs(&manifest, &runner);

    let overview = super::probe_overview(&specs)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    ui::header("Steward Status");

    if overview.is_empty() {
        ui::dim("manifest declares no resources");
        return Ok(());
    }

    let mut divergent = 0usize;
    for item in &overview {
        if item.converged {
            println!("  {} {} {}", "✓".green(), item.id, item.observed.dimmed());
        } else if let Some(err) = &item.probe_error {
            divergent += 1;
            println!("  {} {} {}", "✗".red(), item.id, err.red());
        } else {
            divergent += 1;
            println!(
                "  {} {}: {} {} {}",
                "~".yellow(),
                item.id,
                item.observed.dimmed(),
                "→".dimmed(),
                item.desired
            );
        }
    }

    println!();
    if divergent == 0 {
        ui::success("Everything converged");
    } else if !ctx.quiet {
        ui::warn(&format!(
            "{divergent} of {} resources need attention (run `steward apply`)",
            overview.len()
        ));
    }

    Ok(())
}

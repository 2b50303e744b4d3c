use anyhow::Result;
use owo_colors::OwoColorize;
use rota_core::repository::Repository;

use super::Context;
use crate::cli::SweepCommand;

pub async fn sweep(repo: &impl Repository, command: SweepCommand, ctx: &Context) -> Result<()> {
    let summary = if command.all {
        repo.sweep_all(ctx.now).await?
    } else {
        repo.sweep(ctx.user_id, ctx.now).await?
    };

    println!("{} Sweep finished", "✓".green().bold());
    println!("  Cancelled occurrences: {}", summary.cancelled_instances);
    println!("  Expired counters:      {}", summary.expired_counters);
    println!("  Re-armed series:       {}", summary.rearmed_series);
    if summary.held_for_prompt > 0 {
        println!(
            "  {} {} overdue important occurrence(s) await a decision: run `rota missed`",
            "!".yellow().bold(),
            summary.held_for_prompt
        );
    }
    Ok(())
}

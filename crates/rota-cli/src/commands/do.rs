use anyhow::Result;
use owo_colors::OwoColorize;
use rota_core::models::{CompletionResult, OccurrenceKind};
use rota_core::repository::Repository;

use super::Context;
use crate::cli::DoCommand;
use crate::timezone::format_due;
use crate::util::resolve_instance;

pub async fn do_instance(repo: &impl Repository, command: DoCommand, ctx: &Context) -> Result<()> {
    let view = resolve_instance(repo, ctx.user_id, &command.id).await?;
    let Some(id) = view.key.persisted_id() else {
        return Err(anyhow::anyhow!("Forecast occurrences cannot be completed"));
    };

    if view.kind == OccurrenceKind::Counter {
        let result = repo.record_counter_action(id, ctx.now).await?;
        if result.period_satisfied() {
            println!(
                "{} '{}' done for this period ({}/{})",
                "✓".green().bold(),
                view.title,
                result.counter.actions_done(),
                result.counter.actions_target
            );
            if let Some(next) = result.next {
                println!(
                    "  Next period ends {}",
                    format_due(next.scheduled_at, &ctx.timezone, false).cyan()
                );
            }
        } else {
            println!(
                "Recorded '{}': {}/{} ({} to go)",
                view.title,
                result.counter.actions_done(),
                result.counter.actions_target,
                result.counter.actions_left
            );
        }
        return Ok(());
    }

    match repo.complete_instance(id, ctx.now).await? {
        CompletionResult::Single(_) => {
            println!("{} Completed '{}'", "✓".green().bold(), view.title);
        }
        CompletionResult::Recurring { next, .. } => {
            println!("{} Completed '{}'", "✓".green().bold(), view.title);
            match next {
                Some(next) => println!(
                    "  Next occurrence: {}",
                    format_due(next.scheduled_at, &ctx.timezone, next.time_specified).cyan()
                ),
                None => println!("  The series has no further occurrences"),
            }
        }
    }

    Ok(())
}

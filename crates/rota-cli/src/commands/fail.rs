use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use rota_core::models::{CommandResult, InstanceCommand, OccurrenceKind, Outcome};
use rota_core::repository::Repository;

use super::Context;
use crate::cli::FailCommand;
use crate::util::resolve_instance;

pub async fn fail_instance(repo: &impl Repository, command: FailCommand, ctx: &Context) -> Result<()> {
    let view = resolve_instance(repo, ctx.user_id, &command.id).await?;
    let Some(id) = view.key.persisted_id() else {
        return Err(anyhow!("Forecast occurrences cannot be failed"));
    };
    if view.kind == OccurrenceKind::Counter {
        return Err(anyhow!("Counters close on their own when the period ends"));
    }

    let result = repo
        .apply_command(
            InstanceCommand {
                instance_id: id,
                outcome: Outcome::Failed,
                failure_reason: command.reason,
            },
            ctx.now,
        )
        .await?;

    if let CommandResult::Failed(instance) = result {
        println!(
            "{} Marked '{}' as failed: {}",
            "✗".red().bold(),
            view.title,
            instance.failure_reason.as_deref().unwrap_or(ctx.default_failure_reason.as_str())
        );
    }
    Ok(())
}

use anyhow::{anyhow, Result};
use chrono_humanize::{Accuracy, HumanTime, Tense};
use dialoguer::{Input, Select};
use owo_colors::{OwoColorize, Style};
use rota_core::models::{InstanceCommand, MissedDeadline, Outcome};
use rota_core::repository::Repository;

use super::Context;
use crate::timezone::format_due;

const CHOICES: [&str; 3] = ["Completed late", "Failed", "Decide later"];

fn describe(missed: &MissedDeadline, ctx: &Context) -> String {
    format!(
        "'{}' was due {} ({} ago)",
        missed.instance.title,
        format_due(missed.instance.scheduled_at, &ctx.timezone, missed.instance.time_specified),
        HumanTime::from(missed.overdue_by).to_text_en(Accuracy::Rough, Tense::Present)
    )
}

/// Walks the overdue occurrences of important tasks one at a time.
pub async fn resolve_missed(repo: &impl Repository, ctx: &Context) -> Result<()> {
    repo.sweep(ctx.user_id, ctx.now).await?;

    let mut resolved = 0;
    while let Some(missed) = repo.next_missed_deadline(ctx.user_id, ctx.now).await? {
        let Some(instance_id) = missed.instance.key.persisted_id() else {
            return Err(anyhow!("Missed deadline without a stored occurrence"));
        };

        println!("{} {}", "!".red().bold(), describe(&missed, ctx));
        let choice = Select::new()
            .with_prompt("What happened?")
            .items(&CHOICES)
            .default(0)
            .interact()?;

        let command = match choice {
            0 => InstanceCommand {
                instance_id,
                outcome: Outcome::Completed,
                failure_reason: None,
            },
            1 => {
                let reason: String = Input::new()
                    .with_prompt("Reason")
                    .default(ctx.default_failure_reason.clone())
                    .interact_text()?;
                InstanceCommand {
                    instance_id,
                    outcome: Outcome::Failed,
                    failure_reason: Some(reason),
                }
            }
            _ => break,
        };

        repo.apply_command(command, ctx.now).await?;
        resolved += 1;
    }

    let style = Style::new().bright_black();
    if resolved == 0 {
        println!("{}", "No missed deadlines to resolve.".style(style));
    } else {
        println!("{} Resolved {} missed deadline(s)", "✓".green().bold(), resolved);
    }
    Ok(())
}

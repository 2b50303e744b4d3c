use anyhow::Result;
use owo_colors::{OwoColorize, Style};
use rota_core::models::{CreatedTask, NewRecurrenceRule, NewTaskData};
use rota_core::repository::Repository;

use super::Context;
use crate::cli::AddCommand;
use crate::parser::{parse_date, parse_days, parse_time};
use crate::timezone::format_due;
use crate::util::short_id;

pub async fn add_task(repo: &impl Repository, command: AddCommand, ctx: &Context) -> Result<()> {
    let data = build_task_data(command, ctx)?;
    let created = repo.add_task(data, ctx.now).await?;
    print_created(&created, ctx);
    Ok(())
}

pub(crate) fn build_task_data(command: AddCommand, ctx: &Context) -> Result<NewTaskData> {
    let at = command.at.as_deref().map(parse_time).transpose()?;

    let recurrence = match command.every {
        Some(every) => {
            let mut rule = NewRecurrenceRule::new(every.into());
            rule.interval_value = command.interval.unwrap_or(1);
            rule.occurrences_per_period = command.times;
            rule.days_of_week = command.on.as_deref().map(parse_days).transpose()?.unwrap_or_default();
            rule.day_of_month = command.day;
            rule.preferred_time = at;
            rule.end_date = command
                .until
                .as_deref()
                .map(|d| parse_date(d, &ctx.timezone, ctx.now))
                .transpose()?;
            rule.end_after_occurrences = command.count;
            rule.validate()?;
            Some(rule)
        }
        None => None,
    };

    let due_on = command
        .due
        .as_deref()
        .map(|d| parse_date(d, &ctx.timezone, ctx.now))
        .transpose()?;

    Ok(NewTaskData {
        user_id: ctx.user_id,
        title: command.title,
        category_name: command.category,
        category_id: None,
        important: command.important,
        instruction: command.instruction,
        due_on,
        due_time: if recurrence.is_none() { at } else { None },
        recurrence,
    })
}

pub(crate) fn print_created(created: &CreatedTask, ctx: &Context) {
    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let subtle_style = Style::new().bright_black();

    match &created.rule {
        Some(rule) => {
            println!(
                "{} Created recurring task: {}",
                "✓".style(success_style),
                created.task.title.bright_white().bold()
            );
            println!("  {} Repeats: {}", "→".style(info_style), rule.to_string().cyan());
        }
        None => {
            println!(
                "{} Created task: {}",
                "✓".style(success_style),
                created.task.title.bright_white().bold()
            );
        }
    }

    match created.first_occurrence {
        Some(at) => {
            let time_specified = created
                .rule
                .as_ref()
                .map_or(true, |rule| rule.preferred_time.is_some());
            println!(
                "  {} Next due: {}",
                "→".style(info_style),
                format_due(at, &ctx.timezone, time_specified).cyan()
            );
        }
        None => println!(
            "  {} No occurrence falls inside the series bounds",
            "→".style(subtle_style)
        ),
    }
    println!("  {} Task ID: {}", "→".style(info_style), short_id(&created.task.id).yellow());
}

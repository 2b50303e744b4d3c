use anyhow::{Context as _, Result};
use owo_colors::{OwoColorize, Style};
use rota_core::models::NewTaskData;
use rota_core::payload::TaskPayload;
use rota_core::repository::Repository;
use serde::Deserialize;
use tokio::io::AsyncReadExt;

use super::Context;
use crate::cli::ImportCommand;
use crate::commands::add::print_created;

/// A file holds either one payload or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadFile {
    Many(Vec<TaskPayload>),
    One(TaskPayload),
}

impl PayloadFile {
    fn into_vec(self) -> Vec<TaskPayload> {
        match self {
            PayloadFile::Many(payloads) => payloads,
            PayloadFile::One(payload) => vec![payload],
        }
    }
}

pub(crate) fn parse_payloads(json: &str) -> Result<Vec<TaskPayload>> {
    let file: PayloadFile = serde_json::from_str(json).context("Invalid task payload JSON")?;
    Ok(file.into_vec())
}

pub async fn import_tasks(repo: &impl Repository, command: ImportCommand, ctx: &Context) -> Result<()> {
    let json = if command.path == "-" {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        tokio::fs::read_to_string(&command.path)
            .await
            .with_context(|| format!("Failed to read '{}'", command.path))?
    };

    let payloads = parse_payloads(&json)?;
    let total = payloads.len();
    for (index, payload) in payloads.into_iter().enumerate() {
        let title = payload.title.clone();
        let mut data = NewTaskData::try_from(payload)
            .with_context(|| format!("Task #{} ('{}') was rejected", index + 1, title))?;
        data.user_id = ctx.user_id;

        let created = repo
            .add_task(data, ctx.now)
            .await
            .with_context(|| format!("Task #{} ('{}') could not be added", index + 1, title))?;
        print_created(&created, ctx);
    }

    println!(
        "{} Imported {} task(s)",
        "✓".style(Style::new().green().bold()),
        total
    );
    Ok(())
}

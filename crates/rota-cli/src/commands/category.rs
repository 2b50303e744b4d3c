use anyhow::Result;
use owo_colors::OwoColorize;
use rota_core::repository::Repository;

use super::Context;
use crate::cli::{CategoryCommand, CategorySubcommand};
use crate::views::table::display_categories;

pub async fn category_command(repo: &impl Repository, command: CategoryCommand, ctx: &Context) -> Result<()> {
    match command.command {
        CategorySubcommand::Add(add) => {
            let category = repo.add_category(ctx.user_id, add.name, ctx.now).await?;
            println!("{} Added category: {}", "✓".green().bold(), category.name);
        }
        CategorySubcommand::List => {
            let categories = repo.find_categories(ctx.user_id).await?;
            display_categories(&categories);
        }
    }
    Ok(())
}

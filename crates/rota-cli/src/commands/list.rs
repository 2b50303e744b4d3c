use anyhow::Result;
use rota_core::repository::Repository;

use super::Context;
use crate::cli::ListCommand;
use crate::query_parser;
use crate::views::table::display_instances;

pub async fn list_instances(repo: &impl Repository, command: ListCommand, ctx: &Context) -> Result<()> {
    let query_str = if command.query.trim().is_empty() && !ctx.default_filters.is_empty() {
        ctx.default_filters.join(" and ")
    } else {
        command.query
    };

    let query = query_parser::parse_query(&query_str)?;

    let instances = match command.forecast {
        Some(days) => {
            let (start, end) = ctx.days_ahead(days);
            repo.list_with_forecast(ctx.user_id, query.as_ref(), start, end, ctx.now)
                .await?
        }
        None => repo.list_instances(ctx.user_id, query.as_ref(), ctx.now).await?,
    };

    display_instances(&instances, &ctx.timezone, ctx.now);

    Ok(())
}

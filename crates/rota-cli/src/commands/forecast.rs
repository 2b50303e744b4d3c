use anyhow::Result;
use rota_core::repository::Repository;

use super::Context;
use crate::cli::ForecastCommand;
use crate::views::table::display_forecast;

pub async fn forecast(repo: &impl Repository, command: ForecastCommand, ctx: &Context) -> Result<()> {
    let (start, end) = ctx.days_ahead(command.days);
    let projected = repo.forecast(ctx.user_id, start, end, ctx.now).await?;
    println!("Forecast {} to {}", start, end);
    display_forecast(&projected, &ctx.timezone, ctx.now);
    Ok(())
}

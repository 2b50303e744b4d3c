use chrono::Utc;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use rota_core::db;
use rota_core::error::CoreError;
use rota_core::repository::SqliteRepository;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod query_parser;
mod timezone;
mod util;
mod views;

#[tokio::main]
async fn main() {
    // Quiet by default; RUST_LOG=rota_core=debug shows generation decisions.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rota_core=warn,rota=warn")),
        )
        .init();

    let cli = cli::Cli::parse();

    if let Err(e) = run(cli).await {
        handle_error(e);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = config::Config::new()?;
    let scheduler = config.scheduler_config()?;

    let ctx = commands::Context {
        user_id: config.user_id,
        timezone: scheduler.timezone,
        now: Utc::now(),
        default_filters: config.default_filters.clone(),
        default_failure_reason: scheduler.default_failure_reason.clone(),
    };

    let db_pool = db::establish_connection(&config.database_path).await?;
    let repository = SqliteRepository::new(db_pool, scheduler);

    match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&repository, command, &ctx).await,
        cli::Commands::Import(command) => commands::import::import_tasks(&repository, command, &ctx).await,
        cli::Commands::List(command) => commands::list::list_instances(&repository, command, &ctx).await,
        cli::Commands::Do(command) => commands::r#do::do_instance(&repository, command, &ctx).await,
        cli::Commands::Fail(command) => commands::fail::fail_instance(&repository, command, &ctx).await,
        cli::Commands::Missed => commands::missed::resolve_missed(&repository, &ctx).await,
        cli::Commands::Sweep(command) => commands::sweep::sweep(&repository, command, &ctx).await,
        cli::Commands::Forecast(command) => commands::forecast::forecast(&repository, command, &ctx).await,
        cli::Commands::Category(command) => commands::category::category_command(&repository, command, &ctx).await,
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(instances) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in instances {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::Validation { field, message } => {
                eprintln!(
                    "{} Invalid {}: {}",
                    "Error:".style(error_style),
                    field.yellow(),
                    message
                );
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InstanceClosed(_) => {
                eprintln!(
                    "{} This occurrence is already completed or failed",
                    "Error:".style(error_style)
                );
            }
            _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}

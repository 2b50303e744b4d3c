use clap::{Parser, Subcommand, ValueEnum};
use rota_core::models::Frequency;

/// Recurring tasks, habit counters and deadlines from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new task, one-time or recurring
    Add(AddCommand),
    /// Import tasks from a JSON file ("-" reads stdin)
    Import(ImportCommand),
    /// List occurrences
    List(ListCommand),
    /// Complete an occurrence, or record one action on a counter
    Do(DoCommand),
    /// Mark an occurrence as failed
    Fail(FailCommand),
    /// Decide on overdue occurrences of important tasks
    Missed,
    /// Cancel overdue occurrences and re-arm idle series
    Sweep(SweepCommand),
    /// Preview upcoming occurrences without creating them
    Forecast(ForecastCommand),
    /// Manage categories
    Category(CategoryCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatEvery {
    Day,
    Week,
    Month,
}

impl From<RepeatEvery> for Frequency {
    fn from(every: RepeatEvery) -> Self {
        match every {
            RepeatEvery::Day => Frequency::Daily,
            RepeatEvery::Week => Frequency::Weekly,
            RepeatEvery::Month => Frequency::Monthly,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// Category name; created when it does not exist yet
    #[clap(short, long)]
    pub category: Option<String>,
    /// Important tasks are held for a decision when their deadline passes
    #[clap(short, long)]
    pub important: bool,
    /// Free-form instruction shown with the task
    #[clap(long)]
    pub instruction: Option<String>,
    /// Due date of a one-time task (e.g. 'tomorrow', '2026-12-31')
    #[clap(short, long, conflicts_with = "every")]
    pub due: Option<String>,
    /// Time of day (e.g. '9:00 AM', '14:30')
    #[clap(long)]
    pub at: Option<String>,
    /// Repeat every day, week or month
    #[clap(long, value_enum)]
    pub every: Option<RepeatEvery>,
    /// Repeat every N days, weeks or months
    #[clap(long, requires = "every")]
    pub interval: Option<u32>,
    /// Track N actions per period instead of single occurrences
    #[clap(long, requires = "every", conflicts_with_all = ["on", "day"])]
    pub times: Option<u32>,
    /// Days of week for weekly recurrence (mon,wed,fri or 1,3,5)
    #[clap(long, requires = "every")]
    pub on: Option<String>,
    /// Day of month for monthly recurrence
    #[clap(long, requires = "every")]
    pub day: Option<u32>,
    /// Last date of the series
    #[clap(long, requires = "every")]
    pub until: Option<String>,
    /// Maximum number of occurrences
    #[clap(long, requires = "every")]
    pub count: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct ImportCommand {
    /// Path to a JSON task payload or array of payloads
    pub path: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// A filter query string (e.g., "status:open and (category:Health or important:true)")
    #[clap(default_value = "")]
    pub query: String,
    /// Merge in forecast occurrences for the next N days
    #[clap(long, value_name = "DAYS")]
    pub forecast: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct DoCommand {
    /// The ID (or unique prefix) of the occurrence
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct FailCommand {
    /// The ID (or unique prefix) of the occurrence
    pub id: String,
    /// Why the occurrence was not done
    #[clap(short, long)]
    pub reason: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SweepCommand {
    /// Sweep every user's tasks, not only the configured user's
    #[clap(long)]
    pub all: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ForecastCommand {
    /// Number of days to project, starting today
    #[clap(short, long, default_value_t = 7)]
    pub days: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct CategoryCommand {
    #[command(subcommand)]
    pub command: CategorySubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategorySubcommand {
    /// Add a new category
    Add(AddCategoryCommand),
    /// List categories
    List,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCategoryCommand {
    /// The name of the category
    pub name: String,
}

use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use rota_core::models::{Category, ForecastInstance, InstanceKey, InstanceStatus, InstanceView, OccurrenceKind};

use crate::timezone::format_due;
use crate::util::short_id;

fn id_cell(key: &InstanceKey) -> Cell {
    match key {
        InstanceKey::Persisted(id) => Cell::new(short_id(id)),
        InstanceKey::Forecast(_) => Cell::new("forecast").fg(Color::DarkGrey),
    }
}

fn title_cell(title: &str, important: bool, status: InstanceStatus, forecast: bool) -> Cell {
    let mut display = String::new();
    if important {
        display.push_str("! ");
    }
    display.push_str(title);

    let cell = Cell::new(display);
    match status {
        InstanceStatus::Completed | InstanceStatus::Failed => {
            cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey)
        }
        InstanceStatus::Open if forecast => cell.add_attribute(Attribute::Italic).fg(Color::DarkGrey),
        InstanceStatus::Open if important => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        InstanceStatus::Open => cell,
    }
}

fn due_cell(scheduled_at: DateTime<Utc>, time_specified: bool, status: InstanceStatus, tz: &Tz, now: DateTime<Utc>) -> Cell {
    let due_text = format!(
        "{} ({})",
        format_due(scheduled_at, tz, time_specified),
        scheduled_at.humanize()
    );
    if status != InstanceStatus::Open {
        return Cell::new(due_text);
    }

    let today = now.with_timezone(tz).date_naive();
    if scheduled_at < now {
        Cell::new(due_text).fg(Color::Red) // Overdue
    } else if scheduled_at.with_timezone(tz).date_naive() == today {
        Cell::new(due_text).fg(Color::Yellow) // Due today
    } else {
        Cell::new(due_text)
    }
}

fn progress_text(kind: OccurrenceKind, actions_left: Option<i64>, actions_target: Option<i64>) -> String {
    match (kind, actions_left, actions_target) {
        (OccurrenceKind::Counter, Some(left), Some(target)) => format!("{}/{}", target - left, target),
        (OccurrenceKind::Counter, None, Some(target)) => format!("0/{}", target),
        _ => "".to_string(),
    }
}

pub fn display_instances(instances: &[InstanceView], tz: &Tz, now: DateTime<Utc>) {
    if instances.is_empty() {
        println!("No occurrences found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Due", "Progress", "Category"]);

    for instance in instances {
        let forecast = instance.key.is_forecast();
        let mut row = Row::new();
        row.add_cell(id_cell(&instance.key));
        row.add_cell(title_cell(&instance.title, instance.important, instance.status, forecast));

        let status_cell = Cell::new(instance.status.to_string());
        row.add_cell(match instance.status {
            InstanceStatus::Completed => status_cell.fg(Color::Green),
            InstanceStatus::Failed => status_cell.fg(Color::DarkGrey),
            InstanceStatus::Open => status_cell,
        });

        row.add_cell(due_cell(instance.scheduled_at, instance.time_specified, instance.status, tz, now));
        row.add_cell(Cell::new(progress_text(
            instance.kind,
            instance.actions_left,
            instance.actions_target,
        )));

        let mut category = instance.category_name.clone().unwrap_or_else(|| "None".to_string());
        if let Some(reason) = &instance.failure_reason {
            category = format!("{} ({})", category, reason);
        }
        row.add_cell(Cell::new(category));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_forecast(projected: &[ForecastInstance], tz: &Tz, now: DateTime<Utc>) {
    if projected.is_empty() {
        println!("Nothing scheduled in this range.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Due", "Title", "Progress", "Category"]);

    for occurrence in projected {
        let mut row = Row::new();
        row.add_cell(due_cell(
            occurrence.scheduled_at,
            occurrence.time_specified,
            InstanceStatus::Open,
            tz,
            now,
        ));
        row.add_cell(title_cell(&occurrence.title, occurrence.important, InstanceStatus::Open, false));
        row.add_cell(Cell::new(
            occurrence
                .actions_target
                .map(|target| format!("0/{}", target))
                .unwrap_or_default(),
        ));
        row.add_cell(Cell::new(occurrence.category_name.as_deref().unwrap_or("None")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_categories(categories: &[Category]) {
    if categories.is_empty() {
        println!("No categories found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Created At"]);

    for category in categories {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&category.id)));
        row.add_cell(Cell::new(&category.name));
        row.add_cell(Cell::new(category.created_at.humanize()));
        table.add_row(row);
    }

    println!("{table}");
}

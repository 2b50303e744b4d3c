use crate::models::InstanceStatus;
use crate::query::{DueDate, Filter, Operator, Query, QueryContext};
use sqlx::{QueryBuilder, Sqlite};

/// Utility functions for building SQL queries from our AST.
///
/// Clauses refer to the `o` (occurrences), `t` (tasks) and `c` (categories)
/// aliases of the listing query.
pub struct SqlQueryBuilder;

impl SqlQueryBuilder {
    /// Build a SQL WHERE clause from a Query AST
    pub fn build_sql_where_clause(query: &Query, ctx: &QueryContext, qb: &mut QueryBuilder<'_, Sqlite>) {
        match query {
            Query::Filter(filter) => match filter {
                Filter::Status(status) => Self::build_status_clause(*status, qb),
                Filter::Category(name) => {
                    qb.push("LOWER(c.name) = LOWER(");
                    qb.push_bind(name.clone());
                    qb.push(")");
                }
                Filter::Important(important) => {
                    qb.push("t.important = ");
                    qb.push_bind(*important);
                }
                Filter::Due(due_date) => Self::build_due_date_clause(due_date, ctx, qb),
            },
            Query::Not(query) => {
                qb.push("NOT (");
                Self::build_sql_where_clause(query, ctx, qb);
                qb.push(")");
            }
            Query::Binary { op, left, right } => {
                qb.push("(");
                Self::build_sql_where_clause(left, ctx, qb);
                match op {
                    Operator::And => qb.push(") AND ("),
                    Operator::Or => qb.push(") OR ("),
                };
                Self::build_sql_where_clause(right, ctx, qb);
                qb.push(")");
            }
        }
    }

    fn build_status_clause(status: InstanceStatus, qb: &mut QueryBuilder<'_, Sqlite>) {
        match status {
            InstanceStatus::Open => qb.push("(o.completed_at IS NULL AND o.cancelled = 0)"),
            InstanceStatus::Completed => qb.push("(o.completed_at IS NOT NULL AND o.cancelled = 0)"),
            InstanceStatus::Failed => qb.push("o.cancelled = 1"),
        };
    }

    /// Build SQL clause for due date filters. Dates are local to the context's zone.
    fn build_due_date_clause(due_date: &DueDate, ctx: &QueryContext, qb: &mut QueryBuilder<'_, Sqlite>) {
        let today = ctx.today();
        match due_date {
            DueDate::Today => Self::push_day(ctx, today, qb),
            DueDate::Tomorrow => match today.succ_opt() {
                Some(tomorrow) => Self::push_day(ctx, tomorrow, qb),
                None => {
                    qb.push("0");
                }
            },
            DueDate::On(date) => Self::push_day(ctx, *date, qb),
            DueDate::Before(date) => {
                qb.push("o.scheduled_at < ");
                qb.push_bind(ctx.start_of(*date));
            }
            DueDate::After(date) => {
                qb.push("o.scheduled_at >= ");
                qb.push_bind(ctx.day_bounds(*date).1);
            }
            DueDate::Overdue => {
                qb.push("(o.scheduled_at < ");
                qb.push_bind(ctx.now);
                qb.push(" AND o.completed_at IS NULL AND o.cancelled = 0)");
            }
        }
    }

    fn push_day(ctx: &QueryContext, date: chrono::NaiveDate, qb: &mut QueryBuilder<'_, Sqlite>) {
        let (start, end) = ctx.day_bounds(date);
        qb.push("(o.scheduled_at >= ");
        qb.push_bind(start);
        qb.push(" AND o.scheduled_at < ");
        qb.push_bind(end);
        qb.push(")");
    }
}

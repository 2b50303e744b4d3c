use std::str::FromStr;

use chrono::NaiveDate;
use pest::iterators::Pairs;
use pest::pratt_parser::PrattParser;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use rota_core::models::InstanceStatus;
use rota_core::query::{DueDate, Filter, Operator, Query};

#[derive(Parser)]
#[grammar = "filter.pest"]
pub struct FilterParser;

lazy_static::lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = {
        use pest::pratt_parser::{Assoc::*, Op};
        use Rule::*;

        PrattParser::new()
            .op(Op::infix(or, Left))
            .op(Op::infix(and, Left))
            .op(Op::prefix(not))
    };
}

#[derive(Error, Debug)]
pub enum QueryParseError {
    #[error("Pest parsing error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),
    #[error("Unknown rule: {0:?}")]
    UnknownRule(Rule),
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
    #[error("Invalid due value: {0} (expected today, tomorrow, overdue, YYYY-MM-DD, before:DATE or after:DATE)")]
    InvalidDue(String),
    #[error("Invalid boolean value: {0}")]
    InvalidBool(String),
}

fn parse_date(value: &str) -> Result<NaiveDate, QueryParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| QueryParseError::InvalidDue(value.to_string()))
}

fn parse_due(value: &str) -> Result<DueDate, QueryParseError> {
    let due = match value.to_lowercase().as_str() {
        "today" => DueDate::Today,
        "tomorrow" => DueDate::Tomorrow,
        "overdue" => DueDate::Overdue,
        other => match other.split_once(':') {
            Some(("before", date)) => DueDate::Before(parse_date(date)?),
            Some(("after", date)) => DueDate::After(parse_date(date)?),
            Some(_) => return Err(QueryParseError::InvalidDue(value.to_string())),
            None => DueDate::On(parse_date(other)?),
        },
    };
    Ok(due)
}

fn parse_bool(value: &str) -> Result<bool, QueryParseError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(QueryParseError::InvalidBool(value.to_string())),
    }
}

fn parse_filter(key: &str, value: &str) -> Result<Filter, QueryParseError> {
    let filter = match key.to_lowercase().as_str() {
        "status" => {
            let status =
                InstanceStatus::from_str(value).map_err(|_| QueryParseError::InvalidStatus(value.to_string()))?;
            Filter::Status(status)
        }
        "category" => Filter::Category(value.to_string()),
        "important" => Filter::Important(parse_bool(value)?),
        "due" => Filter::Due(parse_due(value)?),
        _ => {
            return Err(QueryParseError::InvalidFilter(format!(
                "Unknown filter key: {}",
                key
            )))
        }
    };
    Ok(filter)
}

fn build_ast(pairs: Pairs<Rule>) -> Result<Query, QueryParseError> {
    PRATT_PARSER
        .map_primary(|primary| match primary.as_rule() {
            Rule::filter_expression => {
                let text = primary.as_str().to_string();
                let mut inner = primary.into_inner();
                let (Some(key), Some(value)) = (inner.next(), inner.next()) else {
                    return Err(QueryParseError::InvalidFilter(text));
                };
                let value = value.as_str().trim_matches('"');
                Ok(Query::Filter(parse_filter(key.as_str(), value)?))
            }
            Rule::expression => build_ast(primary.into_inner()),
            rule => Err(QueryParseError::UnknownRule(rule)),
        })
        .map_prefix(|op, rhs| {
            let op_rule = op.as_rule();
            match op_rule {
                Rule::not => Ok(Query::Not(Box::new(rhs?))),
                _ => Err(QueryParseError::UnknownRule(op_rule)),
            }
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::and => Operator::And,
                Rule::or => Operator::Or,
                rule => return Err(QueryParseError::UnknownRule(rule)),
            };
            Ok(Query::Binary {
                op,
                left: Box::new(lhs?),
                right: Box::new(rhs?),
            })
        })
        .parse(pairs)
}

/// Parses a listing filter such as `status:open and (category:Health or important:true)`.
///
/// A blank query means no filter.
pub fn parse_query(input: &str) -> Result<Option<Query>, QueryParseError> {
    if input.trim().is_empty() {
        return Ok(None);
    }

    let mut pairs = FilterParser::parse(Rule::filter_query, input).map_err(Box::new)?;
    let expression = pairs
        .next()
        .and_then(|query| query.into_inner().next())
        .ok_or_else(|| QueryParseError::InvalidFilter(input.to_string()))?;
    build_ast(expression.into_inner()).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filter(input: &str) -> Query {
        parse_query(input).unwrap().unwrap()
    }

    #[rstest]
    #[case("status:open", Filter::Status(InstanceStatus::Open))]
    #[case("status:done", Filter::Status(InstanceStatus::Completed))]
    #[case("category:Health", Filter::Category("Health".to_string()))]
    #[case("category:\"Side projects\"", Filter::Category("Side projects".to_string()))]
    #[case("important:yes", Filter::Important(true))]
    #[case("due:today", Filter::Due(DueDate::Today))]
    #[case("due:overdue", Filter::Due(DueDate::Overdue))]
    #[case("due:2026-10-20", Filter::Due(DueDate::On(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap())))]
    #[case("due:before:2026-10-20", Filter::Due(DueDate::Before(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap())))]
    fn test_single_filters(#[case] input: &str, #[case] expected: Filter) {
        assert_eq!(filter(input), Query::Filter(expected));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let parsed = filter("category:Work or important:true and status:open");
        let expected = Query::or(
            Query::Filter(Filter::Category("Work".to_string())),
            Query::and(
                Query::Filter(Filter::Important(true)),
                Query::Filter(Filter::Status(InstanceStatus::Open)),
            ),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parentheses_and_negation() {
        let parsed = filter("not (status:completed or status:failed) && due:today");
        let expected = Query::and(
            Query::negate(Query::or(
                Query::Filter(Filter::Status(InstanceStatus::Completed)),
                Query::Filter(Filter::Status(InstanceStatus::Failed)),
            )),
            Query::Filter(Filter::Due(DueDate::Today)),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_blank_query_is_no_filter() {
        assert!(parse_query("   ").unwrap().is_none());
    }

    #[rstest]
    #[case("priority:high")]
    #[case("status:sleeping")]
    #[case("due:someday")]
    #[case("important:maybe")]
    #[case("status:open and")]
    fn test_invalid_queries(#[case] input: &str) {
        assert!(parse_query(input).is_err());
    }
}

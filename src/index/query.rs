//! # Index Query Parsing
//!
//! Grammar:
//!
//! ```text
//! SELECT [DISTINCT] col[, col...]
//!     [WHERE field op value [AND field op value...]]
//!     [ORDER BY field [ASC|DESC]]
//!     [LIMIT n] [SKIP n]
//! ```
//!
//! `op` is one of `=`, `!=`, `<>`, `>`, `<`. Values are numbers, `true`,
//! `false`, or quoted/bare strings.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::errors::{IndexError, IndexResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub distinct: bool,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub skip: usize,
}

fn query_regex() -> &'static Regex {
    static QUERY: OnceLock<Regex> = OnceLock::new();
    QUERY.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*SELECT\s+(?P<distinct>DISTINCT\s+)?(?P<cols>.+?)(?:\s+WHERE\s+(?P<where>.+?))?(?:\s+ORDER\s+BY\s+(?P<order>[\w.]+)(?:\s+(?P<dir>ASC|DESC))?)?(?:\s+LIMIT\s+(?P<limit>\d+))?(?:\s+SKIP\s+(?P<skip>\d+))?\s*$",
        )
        .expect("static regex")
    })
}

fn and_regex() -> &'static Regex {
    static AND: OnceLock<Regex> = OnceLock::new();
    AND.get_or_init(|| Regex::new(r"(?i)\s+AND\s+").expect("static regex"))
}

fn condition_regex() -> &'static Regex {
    static CONDITION: OnceLock<Regex> = OnceLock::new();
    CONDITION.get_or_init(|| {
        Regex::new(r"^\s*(?P<field>[\w.]+)\s*(?P<op>!=|<>|=|>|<)\s*(?P<value>.+?)\s*$")
            .expect("static regex")
    })
}

impl IndexQuery {
    pub fn parse(query: &str) -> IndexResult<Self> {
        let captures = query_regex()
            .captures(query)
            .ok_or_else(|| IndexError::InvalidQuery(query.to_string()))?;

        let columns: Vec<String> = captures["cols"]
            .split(',')
            .map(|column| column.trim().to_string())
            .filter(|column| !column.is_empty())
            .collect();
        let well_formed = |column: &String| {
            column
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        };
        if columns.is_empty() || !columns.iter().all(well_formed) {
            return Err(IndexError::InvalidQuery(query.to_string()));
        }

        let conditions = match captures.name("where") {
            Some(clause) => and_regex()
                .split(clause.as_str())
                .map(parse_condition)
                .collect::<IndexResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        let order_by = captures.name("order").map(|field| {
            let direction = match captures.name("dir") {
                Some(dir) if dir.as_str().eq_ignore_ascii_case("desc") => Direction::Desc,
                _ => Direction::Asc,
            };
            (field.as_str().to_string(), direction)
        });

        let parse_count = |name: &str| -> IndexResult<Option<usize>> {
            captures
                .name(name)
                .map(|n| {
                    n.as_str()
                        .parse::<usize>()
                        .map_err(|_| IndexError::InvalidQuery(query.to_string()))
                })
                .transpose()
        };

        Ok(Self {
            distinct: captures.name("distinct").is_some(),
            columns,
            conditions,
            order_by,
            limit: parse_count("limit")?,
            skip: parse_count("skip")?.unwrap_or(0),
        })
    }
}

fn parse_condition(clause: &str) -> IndexResult<Condition> {
    let captures = condition_regex()
        .captures(clause)
        .ok_or_else(|| IndexError::InvalidQuery(clause.to_string()))?;
    let operator = match &captures["op"] {
        "=" => Operator::Equal,
        "!=" | "<>" => Operator::NotEqual,
        ">" => Operator::GreaterThan,
        _ => Operator::LessThan,
    };
    Ok(Condition {
        field: captures["field"].to_string(),
        operator,
        value: parse_value(&captures["value"]),
    })
}

fn parse_value(raw: &str) -> Value {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')));
    if quoted {
        return Value::from(&raw[1..raw.len() - 1]);
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::from(float);
    }
    Value::from(raw)
}

/// Total order over the JSON values an index row may hold. Numbers compare
/// numerically, everything else by its string form.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => value_text(left).cmp(&value_text(right)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Condition {
    /// Whether a row satisfies this condition. Missing fields never match.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual.filter(|value| !value.is_null()) else {
            return false;
        };
        let ordering = compare_values(actual, &self.value);
        match self.operator {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::LessThan => ordering == Ordering::Less,
        }
    }
}

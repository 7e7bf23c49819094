//! # As-Of Directives
//!
//! Accepted forms:
//!
//! - `t<millis>`: an exact epoch-millisecond instant
//! - `yyyyMMdd'T'HHmmss`: a UTC wall-clock second
//! - `yyyyMMdd'T'HHmmss±HHMM`: a wall-clock second with an explicit offset
//!
//! Wall-clock forms only carry whole seconds, so they resolve to the last
//! millisecond of the named second: a document modified during that second
//! counts as existing at it.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;

use super::errors::{MetaError, MetaResult};

pub const AS_OF_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
pub const AS_OF_TIME_FORMAT_TZ: &str = "%Y%m%dT%H%M%S%z";

fn millis_regex() -> &'static Regex {
    static MILLIS: OnceLock<Regex> = OnceLock::new();
    MILLIS.get_or_init(|| Regex::new(r"^t(\d+)$").expect("static regex"))
}

/// Resolve an as-of directive to the epoch millisecond it names
pub fn parse_as_of(directive: &str) -> MetaResult<i64> {
    let invalid = || MetaError::InvalidAsOfTime(directive.to_string());

    if let Some(captures) = millis_regex().captures(directive) {
        return captures[1].parse::<i64>().map_err(|_| invalid());
    }

    let seconds = if directive.contains(['+', '-']) {
        DateTime::parse_from_str(directive, AS_OF_TIME_FORMAT_TZ)
            .map_err(|_| invalid())?
            .timestamp()
    } else {
        NaiveDateTime::parse_from_str(directive, AS_OF_TIME_FORMAT)
            .map_err(|_| invalid())?
            .and_utc()
            .timestamp()
    };
    Ok(seconds * 1000 + 999)
}

/// Format an epoch millisecond as an exact directive
pub fn millis_directive(millis: i64) -> String {
    format!("t{}", millis)
}

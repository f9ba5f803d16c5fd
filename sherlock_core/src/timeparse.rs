//! Parsing of human-written durations such as `5w4d3h2m1s`, `90` or `2 hours`.

use chrono::{Duration, NaiveDateTime};
use regex::{Captures, Regex};
use std::{str::FromStr, sync::OnceLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration '{0}'")]
    Invalid(String),
    #[error("unknown time unit '{0}'")]
    UnknownUnit(String),
    #[error("duration out of range")]
    OutOfRange,
}

fn unit_seconds(unit: &str) -> Option<f64> {
    Some(match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86400.0,
        "w" | "wk" | "wks" | "week" | "weeks" => 604800.0,
        _ => return None,
    })
}

fn component_regex() -> &'static Regex {
    static COMPONENT: OnceLock<Regex> = OnceLock::new();
    COMPONENT.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*([A-Za-z]+)\s*,?\s*").expect("duration pattern is valid")
    })
}

fn clock_regex() -> &'static Regex {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    CLOCK.get_or_init(|| {
        Regex::new(r"^(\d+):(\d{1,2})(?::(\d{1,2}))?$").expect("clock pattern is valid")
    })
}

fn parse_number(text: &str) -> Result<f64, TimeParseError> {
    text.parse()
        .map_err(|_| TimeParseError::Invalid(text.to_owned()))
}

/// `[h:]mm:ss`
fn parse_clock(captures: &Captures) -> Result<f64, TimeParseError> {
    let field = |i: usize| captures.get(i).map_or(Ok(0.0), |m| parse_number(m.as_str()));

    let first = field(1)?;
    let second = field(2)?;
    Ok(match captures.get(3) {
        Some(_) => first * 3600.0 + second * 60.0 + field(3)?,
        None => first * 60.0 + second,
    })
}

fn parse_components(text: &str) -> Result<f64, TimeParseError> {
    let mut total = 0.0;
    let mut end = 0;

    for captures in component_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        // Components must cover the whole string with nothing in between
        if whole.start() != end {
            return Err(TimeParseError::Invalid(text.to_owned()));
        }
        end = whole.end();

        let amount = parse_number(&captures[1])?;
        let unit = &captures[2];
        let scale = unit_seconds(unit).ok_or_else(|| TimeParseError::UnknownUnit(unit.to_owned()))?;
        total += amount * scale;
    }

    if end != text.len() {
        return Err(TimeParseError::Invalid(text.to_owned()));
    }

    Ok(total)
}

/// Parse a duration.
///
/// Accepts a bare number of seconds, a clock-style `[h:]mm:ss`, or a sequence of
/// number-and-unit components such as `5w4d3h2m1s` or `1 day, 2 hours`. A leading
/// `+` or `-` is accepted and returned as the sign of the result.
pub fn parse_duration(text: &str) -> Result<Duration, TimeParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text.strip_prefix('+').unwrap_or(text).trim_start()),
    };

    if body.is_empty() {
        return Err(TimeParseError::Invalid(text.to_owned()));
    }

    let seconds = if body.chars().all(|c| c.is_ascii_digit() || c == '.') {
        parse_number(body)?
    } else if let Some(captures) = clock_regex().captures(body) {
        parse_clock(&captures)?
    } else {
        parse_components(body)?
    };

    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return Err(TimeParseError::OutOfRange);
    }

    let duration = Duration::try_milliseconds(millis as i64).ok_or(TimeParseError::OutOfRange)?;
    Ok(if negative { -duration } else { duration })
}

/// How far back a query looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastSeen {
    Forever,
    Within(Duration),
}

impl LastSeen {
    /// Parse an optional command argument. No argument, or `*`, means forever.
    pub fn parse(arg: Option<&str>) -> Result<Self, TimeParseError> {
        match arg.map(str::trim) {
            None | Some("*") => Ok(Self::Forever),
            Some(text) => text.parse(),
        }
    }

    /// The earliest last-seen time that passes this filter, or `None` for no limit.
    ///
    /// The window always looks back from `now`, whatever sign the duration was given with.
    pub fn since(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Forever => None,
            Self::Within(duration) => now.checked_sub_signed(duration.abs()),
        }
    }
}

impl FromStr for LastSeen {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "*" {
            Ok(Self::Forever)
        } else {
            parse_duration(s).map(Self::Within)
        }
    }
}

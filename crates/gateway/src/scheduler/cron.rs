//! Cron expression evaluation (UTC): 5-field
//! `min hour dom month dow`, or 6-field with a leading seconds field.
//! Supports `*`, `*/N`, comma lists, and `N-M` ranges.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use gc_domain::{Error, Result};

#[derive(Debug, Clone)]
pub struct CronExpr {
    sec: String,
    min: String,
    hour: String,
    dom: String,
    month: String,
    dow: String,
}

impl CronExpr {
    /// Parse and validate a 5- or 6-field expression. A 5-field form
    /// fires at second zero of each matching minute.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let (sec, rest) = match fields.len() {
            5 => ("0", &fields[..]),
            6 => (fields[0], &fields[1..]),
            n => {
                return Err(Error::Config(format!(
                    "cron expression \"{expr}\" has {n} fields; expected 5 or 6"
                )))
            }
        };

        let parsed = Self {
            sec: sec.to_owned(),
            min: rest[0].to_owned(),
            hour: rest[1].to_owned(),
            dom: rest[2].to_owned(),
            month: rest[3].to_owned(),
            dow: rest[4].to_owned(),
        };

        for (name, field) in [
            ("second", &parsed.sec),
            ("minute", &parsed.min),
            ("hour", &parsed.hour),
            ("day-of-month", &parsed.dom),
            ("month", &parsed.month),
            ("day-of-week", &parsed.dow),
        ] {
            if !field_valid(field) {
                return Err(Error::Config(format!(
                    "cron expression \"{expr}\": bad {name} field \"{field}\""
                )));
            }
        }
        Ok(parsed)
    }

    /// Whether the expression matches the given instant (to the second).
    pub fn matches(&self, at: &DateTime<Utc>) -> bool {
        self.minute_matches(at) && field_matches(&self.sec, at.second())
    }

    fn minute_matches(&self, at: &DateTime<Utc>) -> bool {
        field_matches(&self.min, at.minute())
            && field_matches(&self.hour, at.hour())
            && field_matches(&self.dom, at.day())
            && field_matches(&self.month, at.month())
            && field_matches(&self.dow, at.weekday().num_days_from_sunday())
    }

    /// Next firing instant strictly after `after`. Scans minute by
    /// minute (bounded to one year), then picks the matching second.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = *after + Duration::seconds(1);
        let mut minute = start
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(start);

        let max_minutes = 366 * 24 * 60;
        for _ in 0..max_minutes {
            if self.minute_matches(&minute) {
                for sec in 0..60u32 {
                    if !field_matches(&self.sec, sec) {
                        continue;
                    }
                    if let Some(candidate) = minute.with_second(sec) {
                        if candidate > *after {
                            return Some(candidate);
                        }
                    }
                }
            }
            minute += Duration::minutes(1);
        }
        None
    }
}

/// Check one cron field against a value. Handles `*`, `*/N`, comma lists,
/// and `N-M` ranges.
fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
    }
    for part in field.split(',') {
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<u32>(), hi.parse::<u32>()) {
                if value >= lo && value <= hi {
                    return true;
                }
            }
        } else if let Ok(n) = part.parse::<u32>() {
            if value == n {
                return true;
            }
        }
    }
    false
}

/// Structural validation of a single field.
fn field_valid(field: &str) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        return step.parse::<u32>().map(|n| n > 0).unwrap_or(false);
    }
    field.split(',').all(|part| {
        if let Some((lo, hi)) = part.split_once('-') {
            lo.parse::<u32>().is_ok() && hi.parse::<u32>().is_ok()
        } else {
            part.parse::<u32>().is_ok()
        }
    })
}

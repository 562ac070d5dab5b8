//! 5-field cron parsing and next-occurrence search (C2).
//!
//! Evaluated strictly in UTC, per spec §4.1 ("baseline... cron: next
//! occurrence of the cron expression... evaluated in UTC"). No timezone
//! support — see DESIGN.md's Open Questions for why this narrows the
//! teacher's timezone-aware evaluator.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Parse a cron field and check if a value matches.
fn cron_field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
    }
    for part in field.split(',') {
        if let Some((start_s, end_s)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start_s.parse::<u32>(), end_s.parse::<u32>()) {
                if value >= start && value <= end {
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

/// Validate a 5-field cron expression. Returns `Ok(())` or an error message.
pub fn validate_cron(cron: &str) -> Result<(), String> {
    let fields: Vec<&str> = cron.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!(
            "expected 5 fields (minute hour dom month dow), got {}",
            fields.len()
        ));
    }
    let names = ["minute", "hour", "day-of-month", "month", "day-of-week"];
    let ranges: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];

    for (i, field) in fields.iter().enumerate() {
        validate_cron_field(field, names[i], ranges[i].0, ranges[i].1)?;
    }
    Ok(())
}

fn validate_cron_field(field: &str, name: &str, min: u32, max: u32) -> Result<(), String> {
    if field == "*" {
        return Ok(());
    }
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step
            .parse()
            .map_err(|_| format!("{name}: invalid step '*/{step}' — expected a number"))?;
        if n == 0 || n > max {
            return Err(format!("{name}: step {n} out of range 1..={max}"));
        }
        return Ok(());
    }
    for part in field.split(',') {
        if let Some((start_s, end_s)) = part.split_once('-') {
            let start: u32 = start_s
                .parse()
                .map_err(|_| format!("{name}: invalid range start '{start_s}'"))?;
            let end: u32 = end_s
                .parse()
                .map_err(|_| format!("{name}: invalid range end '{end_s}'"))?;
            if start < min || start > max || end < min || end > max {
                return Err(format!(
                    "{name}: range {start}-{end} out of bounds {min}..={max}"
                ));
            }
            if start > end {
                return Err(format!("{name}: range start {start} > end {end}"));
            }
        } else {
            let n: u32 = part
                .parse()
                .map_err(|_| format!("{name}: invalid value '{part}'"))?;
            if n < min || n > max {
                return Err(format!("{name}: value {n} out of range {min}..={max}"));
            }
        }
    }
    Ok(())
}

/// Check if a UTC datetime matches a 5-field cron expression.
pub fn cron_matches(cron: &str, dt: &DateTime<Utc>) -> bool {
    let fields: Vec<&str> = cron.split_whitespace().collect();
    if fields.len() != 5 {
        return false;
    }
    cron_field_matches(fields[0], dt.minute())
        && cron_field_matches(fields[1], dt.hour())
        && cron_field_matches(fields[2], dt.day())
        && cron_field_matches(fields[3], dt.month())
        && cron_field_matches(fields[4], dt.weekday().num_days_from_sunday())
}

/// Compute the next occurrence strictly after `after`, in UTC.
pub fn cron_next(cron: &str, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let next_min_secs = 60 - (after.second() as i64);
    let mut candidate = *after + chrono::Duration::seconds(next_min_secs);
    candidate = candidate
        .with_second(0)
        .and_then(|c| c.with_nanosecond(0))
        .unwrap_or(candidate);

    let max_checks = 366 * 24 * 60; // one year of minutes
    for _ in 0..max_checks {
        if cron_matches(cron, &candidate) {
            return Some(candidate);
        }
        candidate += chrono::Duration::minutes(1);
    }
    None
}

/// Compute up to N next occurrences.
pub fn cron_next_n(cron: &str, after: &DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
    let mut results = Vec::with_capacity(n);
    let mut cursor = *after;
    for _ in 0..n {
        match cron_next(cron, &cursor) {
            Some(next) => {
                results.push(next);
                cursor = next;
            }
            None => break,
        }
    }
    results
}

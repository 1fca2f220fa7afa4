//! Due-date policy for remote tasks.
//!
//! Scraped dates arrive as free text in a handful of formats. They are kept
//! verbatim in the store and only interpreted here, when deciding which
//! calendar date the Todoist task should carry.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::models::{Assignment, DateMode};

/// Parse a scraped date string. Formats are tried in order: the LMS long
/// form ("Friday, 5 September 2025, 11:59 PM"), the short form
/// ("5 September 2025"), then ISO ("2025-09-05"). Unparseable text is an
/// absent date, never an error.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%A, %d %B %Y, %I:%M %p") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d %B %Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    None
}

/// Compute the date the remote task should be due on, or `None` for no due
/// date. `today` is injected so callers and tests agree on the clock.
///
/// Exact mode: the parsed due date, verbatim.
///
/// Smart mode: anchor on the more constraining of due and opening date
/// (the opening date only when strictly later, so reminders never fire
/// before an activity opens), then subtract a lead time that shrinks as the
/// reference approaches. Overdue or already-open means today.
pub fn compute_target_date(
    assignment: &Assignment,
    mode: DateMode,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let due = assignment.due_date.as_deref().and_then(parse_flexible_date);

    if mode == DateMode::Exact {
        return due;
    }

    let opening = assignment
        .opening_date
        .as_deref()
        .and_then(parse_flexible_date);

    let (reference, from_opening) = match (due, opening) {
        (Some(d), Some(o)) if o > d => (o, true),
        (Some(d), _) => (d, false),
        (None, Some(o)) => (o, true),
        (None, None) => return None,
    };

    let days_until = (reference - today).num_days();
    if days_until <= 0 {
        return Some(today);
    }

    let lead_days = if from_opening {
        opening_lead(days_until)
    } else {
        due_lead(days_until)
    };

    let mut target = reference - Duration::days(lead_days);
    if target < today {
        target = today;
    }
    Some(target)
}

// Opening-date leads are shorter than due-date leads: a reminder must not
// fire long before the activity even opens.
fn opening_lead(days_until: i64) -> i64 {
    if days_until <= 1 {
        0
    } else if days_until <= 3 {
        1
    } else if days_until <= 7 {
        2
    } else if days_until <= 14 {
        3
    } else {
        7
    }
}

fn due_lead(days_until: i64) -> i64 {
    if days_until <= 3 {
        (days_until - 1).max(1)
    } else if days_until <= 7 {
        3
    } else if days_until <= 14 {
        5
    } else if days_until <= 30 {
        7
    } else {
        14
    }
}

//! Remote task text: the content line, the structured description, and the
//! linkage convention that embeds the local id in the description.
//!
//! The embedded id is the only join between a remote task and its local
//! record, so `encode_linkage`/`decode_linkage` are the single place that
//! knows the wire format.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::Assignment;
use crate::todoist::dto::TaskPayload;

static ACTIVITY_WITH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ACTIVITY\s+(\d+)\s*-\s*([^\[]+)").expect("valid regex")
});
static ACTIVITY_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ACTIVITY\s+(\d+)").expect("valid regex")
});
static ACTIVITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ACTIVITY\s+\d+\s*-?\s*").expect("valid regex")
});
static ACTIVITY_IN_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Activity\s+(\d+)\s*\(([^)]+)\)").expect("valid regex")
});
static BRACKET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[\d+\]").expect("valid regex")
});
static LINKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)task id:\s*(\S+)").expect("valid regex")
});

pub fn encode_linkage(id: &str) -> String {
    format!("\u{1F517} Task ID: {id}")
}

/// Pull the embedded local id back out of a task description.
pub fn decode_linkage(description: &str) -> Option<String> {
    LINKAGE
        .captures(description)
        .map(|caps| caps[1].to_string())
}

/// The remote task's title: "COURSE - Activity N (Name)" when the raw title
/// carries an activity pattern, else "COURSE - title", else the bare title.
pub fn format_task_content(assignment: &Assignment) -> String {
    let course_code = assignment.course_code.as_str();
    let raw_title = assignment.raw_title.as_str();

    let mut activity = None;
    let mut activity_name = String::new();
    if let Some(caps) = ACTIVITY_WITH_NAME.captures(raw_title) {
        activity = Some(format!("Activity {}", &caps[1]));
        activity_name = caps[2].trim().to_string();
    } else if let Some(caps) = ACTIVITY_BARE.captures(raw_title) {
        activity = Some(format!("Activity {}", &caps[1]));
        let remaining = ACTIVITY_PREFIX.replace(raw_title, "");
        activity_name = BRACKET_TAG.replace_all(&remaining, "").trim().to_string();
    } else if let Some(caps) = ACTIVITY_IN_TITLE.captures(&assignment.title) {
        activity = Some(format!("Activity {}", &caps[1]));
        activity_name = caps[2].trim().to_string();
    }

    match (course_code.is_empty(), activity) {
        (false, Some(activity)) => {
            let name = BRACKET_TAG.replace_all(&activity_name, "");
            let name = name.trim();
            if name.is_empty() {
                format!("{course_code} - {activity}")
            } else {
                format!("{course_code} - {activity} ({name})")
            }
        }
        (false, None) => format!("{course_code} - {}", assignment.title),
        (true, _) => assignment.title.clone(),
    }
}

/// One metadata line per known field, linkage last-but-one so a human can
/// still read the description top-down in the Todoist UI.
pub fn format_task_description(assignment: &Assignment) -> String {
    let mut parts = Vec::new();
    if let Some(due) = &assignment.due_date {
        parts.push(format!("\u{1F4C5} Deadline: {due}"));
    }
    if !assignment.origin_url.is_empty() {
        parts.push(format!("\u{1F517} Link: {}", assignment.origin_url));
    }
    if !assignment.course.is_empty() {
        let course = assignment.course.replace(['\r', '\n'], " ");
        parts.push(format!("\u{1F4DA} Course: {}", course.trim()));
    }
    if !assignment.source.is_empty() {
        parts.push(format!("\u{1F4E7} Source: {}", assignment.source));
    }
    parts.push(encode_linkage(&assignment.id));
    parts.push(format!("\u{1F527} Type: {}", assignment.activity_type));
    parts.join("\n")
}

/// Assemble the full create/update body for a record. `due` is whatever the
/// date policy decided; `None` means the task carries no due date.
pub fn build_task_payload(
    assignment: &Assignment,
    project_id: &str,
    due: Option<NaiveDate>,
) -> TaskPayload {
    let labels = if assignment.course_code.is_empty() {
        Vec::new()
    } else {
        vec![assignment.course_code.to_lowercase()]
    };
    TaskPayload {
        content: format_task_content(assignment),
        description: format_task_description(assignment),
        project_id: project_id.to_string(),
        priority: 2,
        due_date: due.map(|d| d.format("%Y-%m-%d").to_string()),
        labels,
    }
}

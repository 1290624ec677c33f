//! Cleaning and checking of task input coming from forms or the command line.

use crate::model::{NewTask, Priority};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Raw create-form fields, exactly as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
}

/// Trimmed and escaped input, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTask {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Title,
    Description,
    Priority,
    Due,
    General,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Priority => "priority",
            Field::Due => "due",
            Field::General => "general",
        }
    }
}

/// One message per field; the first rule a field breaks wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.name(), msg))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

pub fn sanitize(form: &TaskForm) -> CleanTask {
    CleanTask {
        title: escape_html(form.title.as_deref().unwrap_or("")).trim().to_string(),
        description: escape_html(form.description.as_deref().unwrap_or(""))
            .trim()
            .to_string(),
        priority: form
            .priority
            .clone()
            .unwrap_or_else(|| Priority::default().to_string()),
        due: form
            .due
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    }
}

pub fn validate(task: &CleanTask) -> FieldErrors {
    let mut errors = FieldErrors::default();

    if task.title.trim().is_empty() {
        errors.insert(Field::Title, "Title is required");
    } else if task.title.chars().count() > TITLE_MAX_CHARS {
        errors.insert(
            Field::Title,
            format!("Title must be at most {TITLE_MAX_CHARS} characters"),
        );
    }

    if task.description.chars().count() > DESCRIPTION_MAX_CHARS {
        errors.insert(
            Field::Description,
            format!("Description must be at most {DESCRIPTION_MAX_CHARS} characters"),
        );
    }

    if task.priority.parse::<Priority>().is_err() {
        errors.insert(Field::Priority, "Priority must be Low, Medium, or High");
    }

    if let Some(due) = &task.due {
        if let Err(message) = parse_due(due) {
            errors.insert(Field::Due, message);
        }
    }

    errors
}

impl CleanTask {
    pub fn into_new_task(self) -> Result<NewTask, FieldErrors> {
        let errors = validate(&self);
        let priority = self.priority.parse::<Priority>();
        let due = self.due.as_deref().map(parse_due).transpose();
        match (priority, due) {
            (Ok(priority), Ok(due)) if errors.is_empty() => Ok(NewTask {
                title: self.title,
                description: self.description,
                priority,
                due,
            }),
            _ => Err(errors),
        }
    }
}

pub fn sanitize_search_query(text: &str) -> String {
    escape_html(text).trim().to_string()
}

/// Unknown values mean "no filter", never an error.
pub fn validate_priority_filter(text: &str) -> Option<Priority> {
    text.parse().ok()
}

fn parse_due(raw: &str) -> Result<NaiveDate, &'static str> {
    let well_formed = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err("Due date must be in YYYY-MM-DD format");
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| "Due date is not a valid date")
}

//! HTML rendering for the list and create pages.

use crate::model::{Priority, Task, TaskFilter, TaskStats};
use crate::validation::{escape_html as e, Field, FieldErrors};
use std::fmt::Write;

pub struct ListPage<'a> {
    pub flash: String,
    /// Rendered hidden `csrf_token` input.
    pub csrf_field: String,
    pub filter: &'a TaskFilter,
    pub stats: TaskStats,
    pub tasks: Vec<&'a Task>,
}

/// Values echoed back into the create form.
#[derive(Debug, Clone)]
pub struct FormValues {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due: String,
}

impl Default for FormValues {
    fn default() -> Self {
        FormValues {
            title: String::new(),
            description: String::new(),
            priority: Priority::default().to_string(),
            due: String::new(),
        }
    }
}

pub struct CreatePage<'a> {
    pub csrf_field: String,
    pub values: &'a FormValues,
    pub errors: &'a FieldErrors,
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <link rel="stylesheet" href="/assets/style.css">
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        e(title)
    )
}

fn priority_options(selected: Option<&str>) -> String {
    Priority::ALL
        .iter()
        .map(|p| {
            let sel = if selected == Some(p.as_str()) {
                " selected"
            } else {
                ""
            };
            format!(r#"<option value="{p}"{sel}>{p}</option>"#)
        })
        .collect()
}

pub fn list_page(page: &ListPage<'_>) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        r#"<header><h1>TaskPad</h1><p>A minimal task tracker</p></header>
{flash}
<div class="actions"><a href="/create" class="btn btn-primary">+ Add New Task</a></div>
<div class="stats">
    <span class="stat">Total: {total}</span>
    <span class="stat">Open: {open}</span>
    <span class="stat">Completed: {completed}</span>
</div>
<div class="filters">
    <form method="GET" action="/">
        <input type="text" name="q" placeholder="Search tasks..." value="{q}">
        <select name="priority"><option value="">All Priorities</option>{options}</select>
        <button type="submit" class="btn">Filter</button>
        <a href="/" class="btn btn-secondary">Clear</a>
    </form>
</div>
<div class="task-list">
"#,
        flash = page.flash,
        total = page.stats.total,
        open = page.stats.open,
        completed = page.stats.completed,
        q = e(&page.filter.query),
        options = priority_options(page.filter.priority.map(Priority::as_str)),
    );

    if page.tasks.is_empty() {
        let message = if page.stats.total == 0 {
            r#"No tasks yet! Click "Add New Task" to get started."#
        } else {
            "No tasks match your filters."
        };
        let _ = writeln!(body, r#"<div class="empty-state"><p>{}</p></div>"#, e(message));
    }
    for task in &page.tasks {
        body.push_str(&task_card(task, &page.csrf_field));
    }

    let _ = write!(
        body,
        "</div>\n<footer><p>Showing {} of {} tasks</p></footer>",
        page.tasks.len(),
        page.stats.total
    );
    layout("TaskPad - Task List", &body)
}

fn task_card(task: &Task, csrf_field: &str) -> String {
    let mut card = String::new();
    let _ = write!(
        card,
        r#"<div class="task-card{done}" data-id="{id}">
    <div class="task-header">
        <h3>{title}</h3>
        <span class="priority-badge priority-{class}">{priority}</span>
    </div>
"#,
        done = if task.completed { " completed" } else { "" },
        id = e(&task.id),
        title = e(&task.title),
        class = task.priority.as_str().to_lowercase(),
        priority = task.priority,
    );
    if !task.description.is_empty() {
        let _ = writeln!(
            card,
            r#"    <p class="task-description">{}</p>"#,
            e(&task.description)
        );
    }
    card.push_str(r#"    <div class="task-meta">"#);
    if let Some(due) = task.due {
        let _ = write!(
            card,
            r#"<span class="due-date">Due: {}</span>"#,
            due.format("%Y-%m-%d")
        );
    }
    let _ = writeln!(
        card,
        r#"<span class="status-badge">{}</span></div>"#,
        task.status_label()
    );

    card.push_str(r#"    <div class="task-actions">"#);
    if !task.completed {
        card.push_str(&action_form("complete", &task.id, csrf_field, "btn-success", "Complete", ""));
    }
    card.push_str(&action_form(
        "delete",
        &task.id,
        csrf_field,
        "btn-danger",
        "Delete",
        r#" onclick="return confirm('Are you sure you want to delete this task?')""#,
    ));
    card.push_str("</div>\n</div>\n");
    card
}

/// `extra` is spliced into the button tag as-is.
fn action_form(
    action: &str,
    id: &str,
    csrf_field: &str,
    class: &str,
    label: &str,
    extra: &str,
) -> String {
    format!(
        r#"<form method="POST" action="/actions" class="inline"><input type="hidden" name="action" value="{action}"><input type="hidden" name="id" value="{}">{}<button type="submit" class="btn {class}"{extra}>{label}</button></form>"#,
        e(id),
        csrf_field,
    )
}

fn field_error(errors: &FieldErrors, field: Field) -> String {
    errors
        .get(field)
        .map(|m| format!(r#"<span class="error-message">{}</span>"#, e(m)))
        .unwrap_or_default()
}

pub fn create_page(page: &CreatePage<'_>) -> String {
    let values = page.values;
    let errors = page.errors;
    let general = errors
        .get(Field::General)
        .map(|m| format!(r#"<div class="flash-message error">{}</div>"#, e(m)))
        .unwrap_or_default();
    let body = format!(
        r#"<header><h1>New Task</h1><p><a href="/">Back to list</a></p></header>
{general}
<form method="POST" action="/create" class="task-form">
    {csrf}
    <div class="form-group">
        <label for="title">Title <span class="required">*</span></label>
        <input type="text" id="title" name="title" value="{title}" maxlength="200" required>
        {title_error}
    </div>
    <div class="form-group">
        <label for="description">Description (optional)</label>
        <textarea id="description" name="description" rows="4" maxlength="1000">{description}</textarea>
        {description_error}
    </div>
    <div class="form-group">
        <label for="priority">Priority <span class="required">*</span></label>
        <select id="priority" name="priority" required>{options}</select>
        {priority_error}
    </div>
    <div class="form-group">
        <label for="due">Due Date (optional)</label>
        <input type="date" id="due" name="due" value="{due}">
        {due_error}
    </div>
    <div class="form-actions">
        <button type="submit" class="btn btn-primary">Create Task</button>
        <a href="/" class="btn btn-secondary">Cancel</a>
    </div>
</form>"#,
        csrf = page.csrf_field,
        title = e(&values.title),
        title_error = field_error(errors, Field::Title),
        description = e(&values.description),
        description_error = field_error(errors, Field::Description),
        options = priority_options(Some(&values.priority)),
        priority_error = field_error(errors, Field::Priority),
        due = e(&values.due),
        due_error = field_error(errors, Field::Due),
    );
    layout("Add New Task", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;

    fn task(id: &str, completed: bool) -> Task {
        let mut t = Task::new(
            id.to_string(),
            NewTask {
                title: "<Buy> milk".into(),
                description: String::new(),
                priority: Priority::Low,
                due: None,
            },
        );
        t.completed = completed;
        t
    }

    #[test]
    fn list_escapes_and_shows_status() {
        let tasks = [task("1", false), task("2", true)];
        let filter = TaskFilter::default();
        let html = list_page(&ListPage {
            flash: String::new(),
            csrf_field: "<input name=\"csrf_token\">".into(),
            filter: &filter,
            stats: TaskStats::of(&tasks),
            tasks: tasks.iter().collect(),
        });
        assert!(html.contains("&lt;Buy&gt; milk"));
        assert!(!html.contains("<Buy>"));
        assert!(html.contains(r#"<span class="status-badge">Open</span>"#));
        assert!(html.contains(r#"<span class="status-badge">Completed</span>"#));
        assert_eq!(html.matches(r#"value="complete""#).count(), 1);
        assert_eq!(html.matches(r#"value="delete""#).count(), 2);
        assert!(html.contains("Showing 2 of 2 tasks"));
    }

    #[test]
    fn only_delete_asks_for_confirmation() {
        let tasks = [task("1", false)];
        let filter = TaskFilter::default();
        let html = list_page(&ListPage {
            flash: String::new(),
            csrf_field: String::new(),
            filter: &filter,
            stats: TaskStats::of(&tasks),
            tasks: tasks.iter().collect(),
        });
        let confirm = "return confirm('Are you sure you want to delete this task?')";
        assert_eq!(html.matches(confirm).count(), 1);
        assert!(html.contains(&format!(
            r#"<button type="submit" class="btn btn-danger" onclick="{confirm}">Delete</button>"#
        )));
        assert!(html.contains(r#"<button type="submit" class="btn btn-success">Complete</button>"#));
    }

    #[test]
    fn empty_states_differ() {
        let filter = TaskFilter::default();
        let none = list_page(&ListPage {
            flash: String::new(),
            csrf_field: String::new(),
            filter: &filter,
            stats: TaskStats::default(),
            tasks: Vec::new(),
        });
        assert!(none.contains("No tasks yet!"));

        let filtered = list_page(&ListPage {
            flash: String::new(),
            csrf_field: String::new(),
            filter: &filter,
            stats: TaskStats { total: 3, open: 3, completed: 0 },
            tasks: Vec::new(),
        });
        assert!(filtered.contains("No tasks match your filters."));
    }

    #[test]
    fn form_shows_inline_errors() {
        let mut errors = FieldErrors::default();
        errors.insert(Field::Title, "Title is required");
        let values = FormValues {
            priority: "High".into(),
            ..FormValues::default()
        };
        let html = create_page(&CreatePage {
            csrf_field: "<input name=\"csrf_token\">".into(),
            values: &values,
            errors: &errors,
        });
        assert!(html.contains(r#"<span class="error-message">Title is required</span>"#));
        assert!(html.contains(r#"<option value="High" selected>High</option>"#));
        assert!(html.contains(r#"<input name="csrf_token">"#));
    }
}

use crate::config::{Config, Overrides};
use crate::model::{Task, TaskFilter};
use crate::server;
use crate::storage::TaskStore;
use crate::validation::{sanitize, sanitize_search_query, validate_priority_filter, TaskForm};
use anyhow::{anyhow, Context, Result};
use std::io::Write;

pub async fn serve(config: Config) -> Result<()> {
    server::serve(&config).await
}

pub fn list(store: &TaskStore, q: Option<String>, priority: Option<String>) -> Result<()> {
    let tasks = store.load_all();
    let filter = TaskFilter {
        query: q.as_deref().map(sanitize_search_query).unwrap_or_default(),
        priority: priority.as_deref().and_then(validate_priority_filter),
    };
    let shown = filter.apply(&tasks);
    let mut out = std::io::stdout().lock();
    if tasks.is_empty() {
        writeln!(out, "No tasks yet.")?;
    } else if shown.is_empty() {
        writeln!(out, "No tasks match your filters.")?;
    }
    for task in &shown {
        print_task(&mut out, task)?;
    }
    writeln!(out, "Showing {} of {} tasks", shown.len(), tasks.len())?;
    Ok(())
}

pub fn add(
    store: &TaskStore,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    due: Option<String>,
) -> Result<()> {
    let form = TaskForm {
        title: Some(title),
        description,
        priority,
        due,
    };
    let input = sanitize(&form)
        .into_new_task()
        .map_err(|errors| anyhow!("invalid task: {errors}"))?;
    let task = store.add(input).context("saving task")?;
    println!("Added task {}", task.id);
    Ok(())
}

pub fn complete(store: &TaskStore, id: String) -> Result<()> {
    store
        .complete(&id)
        .with_context(|| format!("completing task {id}"))?;
    println!("Completed task {id}");
    Ok(())
}

pub fn delete(store: &TaskStore, id: String) -> Result<()> {
    store
        .delete(&id)
        .with_context(|| format!("deleting task {id}"))?;
    println!("Deleted task {id}");
    Ok(())
}

pub fn load_config(overrides: Overrides) -> Result<Config> {
    Config::resolve(overrides).context("loading configuration")
}

fn print_task(out: &mut impl Write, task: &Task) -> std::io::Result<()> {
    writeln!(
        out,
        "  - {}: {} [{}] {}",
        task.id,
        task.title,
        task.priority,
        task.status_label()
    )?;
    if !task.description.is_empty() {
        writeln!(out, "    {}", task.description)?;
    }
    if let Some(due) = task.due {
        writeln!(out, "    due: {}", due.format("%Y-%m-%d"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    #[test]
    fn add_rejects_invalid_input_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        let err = add(&store, "  ".into(), None, Some("Urgent".into()), None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("title"), "{message}");
        assert!(message.contains("priority"), "{message}");
        assert!(!store.path().exists());
    }

    #[test]
    fn add_then_complete_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        add(&store, "Buy milk".into(), None, Some("Low".into()), None).unwrap();
        let task = store.load_all().pop().unwrap();
        assert_eq!(task.priority, Priority::Low);

        complete(&store, task.id.clone()).unwrap();
        assert!(store.find_by_id(&task.id).unwrap().completed);
        delete(&store, task.id.clone()).unwrap();
        assert!(store.load_all().is_empty());
        assert!(delete(&store, task.id).is_err());
    }

    #[test]
    fn print_task_includes_status_and_due() {
        let mut task = Task::new(
            "1_abc".into(),
            crate::model::NewTask {
                title: "Buy milk".into(),
                description: "semi".into(),
                priority: Priority::High,
                due: chrono::NaiveDate::from_ymd_opt(2024, 1, 2),
            },
        );
        task.completed = true;
        let mut buf = Vec::new();
        print_task(&mut buf, &task).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "  - 1_abc: Buy milk [High] Completed\n    semi\n    due: 2024-01-02\n"
        );
    }
}

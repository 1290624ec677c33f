use crate::model::{NewTask, Task, TaskId, TaskPatch};
use chrono::Utc;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("serializing tasks: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The whole task collection, persisted as one pretty-printed JSON array.
///
/// Every mutation loads the full document, changes it in memory and writes it
/// back through a temp file + rename. Mutations inside one process are
/// serialized; separate processes sharing the file still race and the last
/// writer wins.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TaskStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unparseable documents read as an empty collection.
    pub fn load_all(&self) -> Vec<Task> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = ?self.path, error = %err, "reading task file");
                return Vec::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(path = ?self.path, error = %err, "parsing task file");
                Vec::new()
            }
        }
    }

    pub fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(tasks)?;
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(serialized.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Option<Task> {
        self.load_all().into_iter().find(|t| t.id == id)
    }

    pub fn add(&self, input: NewTask) -> Result<Task, StoreError> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_all();
        let id = loop {
            let candidate = generate_id();
            if !tasks.iter().any(|t| t.id == candidate) {
                break candidate;
            }
        };
        let task = Task::new(id, input);
        tasks.push(task.clone());
        self.save_all(&tasks)?;
        tracing::info!(id = %task.id, "task added");
        Ok(task)
    }

    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_all();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.apply(patch);
        let updated = task.clone();
        self.save_all(&tasks)?;
        tracing::info!(id = %updated.id, "task updated");
        Ok(updated)
    }

    pub fn complete(&self, id: &str) -> Result<Task, StoreError> {
        self.update(id, TaskPatch::complete())
    }

    /// Removes the task in place. An unknown id is `NotFound` and the document
    /// is not rewritten.
    pub fn delete(&self, id: &str) -> Result<Task, StoreError> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_all();
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = tasks.remove(idx);
        self.save_all(&tasks)?;
        tracing::info!(id = %removed.id, "task deleted");
        Ok(removed)
    }
}

fn generate_id() -> TaskId {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}_{}", Utc::now().timestamp(), suffix)
}

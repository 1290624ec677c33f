use crate::session::Session;
use crate::validation::escape_html;
use serde_json::{Map, Value};

const FLASH_KEY: &str = "flash";

/// Read-once messages kept in the session under their category.
pub struct Flash<'a> {
    session: &'a Session,
}

impl<'a> Flash<'a> {
    pub fn new(session: &'a Session) -> Self {
        Flash { session }
    }

    pub fn set(&self, key: &str, message: impl Into<String>) {
        let mut messages = self.messages();
        messages.insert(key.to_string(), Value::String(message.into()));
        self.store(messages);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut messages = self.messages();
        let message = messages.shift_remove(key)?;
        self.store(messages);
        match message {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.messages().contains_key(key)
    }

    /// Markup for every pending message, in the order they were set. All of
    /// them are consumed.
    pub fn render_all(&self) -> String {
        let messages = self.messages();
        if messages.is_empty() {
            return String::new();
        }
        self.session.remove(FLASH_KEY);
        messages
            .iter()
            .map(|(kind, message)| {
                let class = if kind == "error" { "error" } else { "success" };
                let text = match message {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!(
                    r#"<div class="flash-message {class}">{}</div>"#,
                    escape_html(&text)
                )
            })
            .collect()
    }

    fn messages(&self) -> Map<String, Value> {
        match self.session.get(FLASH_KEY) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    fn store(&self, messages: Map<String, Value>) {
        if messages.is_empty() {
            self.session.remove(FLASH_KEY);
        } else {
            self.session.set(FLASH_KEY, Value::Object(messages));
        }
    }
}

use chrono::Utc;
use uuid::Uuid;

use crate::api::{Message, MessageKind, TodoItem, TodoStatus};
use crate::core::config::Config;

pub fn message(kind: MessageKind, content: &str) -> Message {
    Message {
        id: Uuid::new_v4().to_string(),
        kind,
        content: content.to_string(),
        timestamp: Utc::now(),
        tool_calls: None,
        tool_call_id: None,
    }
}

pub fn human_message(content: &str) -> Message {
    message(MessageKind::Human, content)
}

pub fn ai_message(content: &str) -> Message {
    message(MessageKind::Ai, content)
}

pub fn tool_message(content: &str) -> Message {
    message(MessageKind::Tool, content)
}

pub fn todo(content: &str, status: TodoStatus) -> TodoItem {
    TodoItem {
        content: content.to_string(),
        status,
        active_form: content.to_string(),
    }
}

/// A config whose client resolves as available without reaching any real
/// backend; tests that use it never get far enough to open a connection.
pub fn online_config() -> Config {
    Config {
        deployment_url: "http://backend.test".to_string(),
        access_token: Some("test-token".to_string()),
        ..Config::default()
    }
}

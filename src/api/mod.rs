//! Wire payloads exchanged with the agent backend.
//!
//! Everything here mirrors the backend's JSON shapes. Fields the backend may
//! omit carry serde defaults so a sparse response still decodes; `metadata`
//! and `tool_calls` are deliberately untyped because Brook never inspects
//! them, it only carries them through.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod threads;

/// Originator of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
    Tool,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Human => "human",
            MessageKind::Ai => "ai",
            MessageKind::Tool => "tool",
        }
    }

    pub fn is_human(self) -> bool {
        self == MessageKind::Human
    }

    pub fn is_ai(self) -> bool {
        self == MessageKind::Ai
    }

    pub fn is_tool(self) -> bool {
        self == MessageKind::Tool
    }
}

/// One entry in a thread's message list.
///
/// Ids are assigned server-side for history entries and client-side (v4
/// UUIDs) for the optimistic entries the session inserts while a send is in
/// flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// A freshly stamped human message for optimistic insertion.
    pub fn human(content: impl Into<String>) -> Self {
        Self::stamped(MessageKind::Human, content.into())
    }

    /// The empty `ai` message that incoming chunks will fill.
    pub fn pending_ai() -> Self {
        Self::stamped(MessageKind::Ai, String::new())
    }

    fn stamped(kind: MessageKind, content: String) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            kind,
            content,
            timestamp: Utc::now(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Progress state of a [`TodoItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One item of the agent's working todo list. The backend produces the whole
/// list per turn; the session replaces rather than merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm", default)]
    pub active_form: String,
}

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// The backend's whole-turn answer to `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    pub thread_id: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Completion payload delivered alongside the terminal stream event: the
/// derived state of the turn minus the message transcript.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnSummary {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Value,
}

impl From<ChatResponse> for TurnSummary {
    fn from(response: ChatResponse) -> Self {
        let ChatResponse {
            todos,
            files,
            thread_id,
            metadata,
            ..
        } = response;
        TurnSummary {
            // An empty thread id means the backend did not name one.
            thread_id: (!thread_id.is_empty()).then_some(thread_id),
            todos,
            files,
            metadata,
        }
    }
}

/// One `data:` frame of the true-incremental event stream, dispatched on its
/// `type` discriminant. `start` and `phase` are informational only.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    TextChunk {
        content: String,
    },
    Complete(TurnSummary),
    Error {
        message: String,
    },
    Start {
        thread_id: Option<String>,
    },
    Phase {
        #[serde(default)]
        phase: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_round_trips_wire_names() {
        for (kind, wire) in [
            (MessageKind::Human, "\"human\""),
            (MessageKind::Ai, "\"ai\""),
            (MessageKind::Tool, "\"tool\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), wire);
            assert_eq!(serde_json::from_str::<MessageKind>(wire).unwrap(), kind);
        }
    }

    #[test]
    fn message_decodes_backend_shape() {
        let raw = r#"{
            "id": "msg-1",
            "type": "ai",
            "content": "hello",
            "timestamp": "2024-05-01T12:00:00Z",
            "tool_calls": null,
            "tool_call_id": null
        }"#;

        let message: Message = serde_json::from_str(raw).expect("message should decode");
        assert_eq!(message.id, "msg-1");
        assert!(message.kind.is_ai());
        assert_eq!(message.content, "hello");
        assert!(message.tool_calls.is_none());
        assert!(message.tool_call_id.is_none());
    }

    #[test]
    fn optimistic_messages_get_fresh_ids() {
        let human = Message::human("hi");
        let pending = Message::pending_ai();

        assert!(human.kind.is_human());
        assert_eq!(human.content, "hi");
        assert!(pending.kind.is_ai());
        assert!(pending.content.is_empty());
        assert_ne!(human.id, pending.id);
    }

    #[test]
    fn todo_item_maps_active_form_wire_name() {
        let raw = r#"{"content":"write tests","status":"in_progress","activeForm":"Writing tests"}"#;
        let todo: TodoItem = serde_json::from_str(raw).expect("todo should decode");
        assert_eq!(todo.status, TodoStatus::InProgress);
        assert_eq!(todo.active_form, "Writing tests");

        let encoded = serde_json::to_string(&todo).unwrap();
        assert!(encoded.contains("\"activeForm\""));
        assert!(encoded.contains("\"in_progress\""));
    }

    #[test]
    fn chat_request_omits_absent_thread_id() {
        let without = ChatRequest {
            message: "hi".into(),
            thread_id: None,
        };
        assert_eq!(
            serde_json::to_string(&without).unwrap(),
            r#"{"message":"hi"}"#
        );

        let with = ChatRequest {
            message: "hi".into(),
            thread_id: Some("t1".into()),
        };
        assert_eq!(
            serde_json::to_string(&with).unwrap(),
            r#"{"message":"hi","thread_id":"t1"}"#
        );
    }

    #[test]
    fn chat_response_defaults_sparse_fields() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"thread_id":"t1"}"#).expect("sparse response should decode");
        assert!(response.messages.is_empty());
        assert!(response.todos.is_empty());
        assert!(response.files.is_empty());
        assert!(response.metadata.is_null());
    }

    #[test]
    fn turn_summary_treats_empty_thread_id_as_absent() {
        let named: ChatResponse = serde_json::from_str(r#"{"thread_id":"t1"}"#).unwrap();
        assert_eq!(TurnSummary::from(named).thread_id.as_deref(), Some("t1"));

        let unnamed: ChatResponse = serde_json::from_str(r#"{"thread_id":""}"#).unwrap();
        assert_eq!(TurnSummary::from(unnamed).thread_id, None);
    }

    #[test]
    fn stream_frames_dispatch_on_type() {
        let chunk: StreamFrame =
            serde_json::from_str(r#"{"type":"text_chunk","content":"hi"}"#).unwrap();
        assert!(matches!(chunk, StreamFrame::TextChunk { content } if content == "hi"));

        let complete: StreamFrame = serde_json::from_str(
            r#"{"type":"complete","thread_id":"t1","todos":[],"files":{},"metadata":{}}"#,
        )
        .unwrap();
        match complete {
            StreamFrame::Complete(summary) => {
                assert_eq!(summary.thread_id.as_deref(), Some("t1"));
                assert!(summary.todos.is_empty());
            }
            other => panic!("expected complete frame, got {other:?}"),
        }

        let error: StreamFrame =
            serde_json::from_str(r#"{"type":"error","message":"agent crashed"}"#).unwrap();
        assert!(matches!(error, StreamFrame::Error { message } if message == "agent crashed"));

        let start: StreamFrame =
            serde_json::from_str(r#"{"type":"start","thread_id":"t1"}"#).unwrap();
        assert!(matches!(start, StreamFrame::Start { thread_id: Some(id) } if id == "t1"));

        let phase: StreamFrame =
            serde_json::from_str(r#"{"type":"phase","phase":"planning"}"#).unwrap();
        assert!(matches!(phase, StreamFrame::Phase { phase } if phase == "planning"));
    }

    #[test]
    fn unknown_frame_types_fail_to_decode() {
        assert!(serde_json::from_str::<StreamFrame>(r#"{"type":"heartbeat"}"#).is_err());
    }
}

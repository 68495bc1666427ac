//! Thread directory payloads and the derived titles shown for them.
//!
//! `GET /threads/search` returns raw thread records whose state lives in a
//! loosely typed `values` blob. Listings only need an id, timestamps, and a
//! human-readable title, so the mapping here is a presentation concern: the
//! title is the thread's first message truncated to fit, or a stub built from
//! the thread id when no usable text exists.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

const TITLE_MAX_CHARS: usize = 50;
const ID_PREFIX_CHARS: usize = 8;

/// Raw record returned by the backend's thread search.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadPayload {
    #[serde(default)]
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub values: Value,
}

/// A thread as presented in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert a raw search record into its listing form.
pub fn summarize(payload: ThreadPayload) -> ThreadSummary {
    let title = derive_title(&payload);
    ThreadSummary {
        id: payload.thread_id,
        title,
        created_at: payload.created_at,
        updated_at: payload.updated_at,
    }
}

/// Sort summaries for display: most recently updated first, ties broken by id
/// so the order is stable across refreshes.
pub fn sort_summaries(summaries: &mut [ThreadSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

fn derive_title(payload: &ThreadPayload) -> String {
    payload
        .values
        .pointer("/messages/0/content")
        .and_then(Value::as_str)
        .map(truncate_title)
        .unwrap_or_else(|| fallback_title(&payload.thread_id))
}

fn truncate_title(content: &str) -> String {
    // Cut on a char boundary; byte indexing would split multi-byte text.
    match content.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn fallback_title(thread_id: &str) -> String {
    if thread_id.is_empty() {
        return "Thread unknown".to_string();
    }
    let prefix: String = thread_id.chars().take(ID_PREFIX_CHARS).collect();
    format!("Thread {prefix}")
}

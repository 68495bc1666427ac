use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{Message, TodoItem};
use crate::core::chat_stream::{ChatStreamService, StreamEvent, StreamParams};
use crate::core::client::AgentClient;
use crate::core::config::{Config, Transport};

/// Shown in place of a reply when a turn fails before any content arrived.
pub const FALLBACK_REPLY: &str =
    "Sorry, something went wrong while processing your message. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Sending,
}

/// What a stream event did to the session, for the caller to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// New text was appended to the pending reply.
    Chunk(String),
    /// The turn finished; `new_thread_id` is set when the backend assigned
    /// a thread this session didn't know yet.
    Completed { new_thread_id: Option<String> },
    /// The turn failed with this message; the pending reply holds either
    /// the partial content or the fallback apology.
    Failed(String),
    /// The event belonged to a superseded stream and was dropped.
    Ignored,
}

/// Owns the visible state of one conversation: the message list for the
/// active thread, the todo and file sinks, and the send state machine.
///
/// Streaming is split in two halves so the caller controls the event
/// loop: `send` spawns a background turn, and every event the service
/// emits is handed back through [`ChatSession::apply`] together with its
/// stream id. Events from superseded streams are dropped there, which is
/// what makes `stop` and thread switches safe mid-turn.
pub struct ChatSession {
    client: Option<AgentClient>,
    transport: Transport,
    stream: ChatStreamService,
    messages: Vec<Message>,
    todos: Vec<TodoItem>,
    files: BTreeMap<String, String>,
    thread_id: Option<String>,
    phase: SessionPhase,
    pending_message_id: Option<String>,
    accumulator: String,
    cancel_token: CancellationToken,
    current_stream_id: u64,
}

impl ChatSession {
    pub fn new(config: &Config) -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (stream, events) = ChatStreamService::new();
        let session = Self {
            client: AgentClient::from_config(config),
            transport: config.transport,
            stream,
            messages: Vec::new(),
            todos: Vec::new(),
            files: BTreeMap::new(),
            thread_id: None,
            phase: SessionPhase::Idle,
            pending_message_id: None,
            accumulator: String::new(),
            cancel_token: CancellationToken::new(),
            current_stream_id: 0,
        };
        (session, events)
    }

    /// Whether a client could be built from the config. When this is
    /// false every send is ignored and history loads come back empty.
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn todos(&self) -> &[TodoItem] {
        &self.todos
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_sending(&self) -> bool {
        self.phase == SessionPhase::Sending
    }

    /// Starts a turn: appends the optimistic human message and the empty
    /// pending reply, then spawns the transport task. Returns the stream
    /// id to match incoming events against, or `None` if the send was
    /// ignored.
    pub fn send(&mut self, text: &str) -> Option<u64> {
        let params = self.begin_send(text)?;
        let stream_id = params.stream_id;
        self.stream.spawn_stream(self.transport, params);
        Some(stream_id)
    }

    /// The synchronous half of [`ChatSession::send`]: mutates session
    /// state and builds the params for the transport task without
    /// spawning it.
    pub fn begin_send(&mut self, text: &str) -> Option<StreamParams> {
        let Some(client) = self.client.clone() else {
            warn!("send ignored: no deployment URL or access token");
            return None;
        };
        if self.phase == SessionPhase::Sending {
            warn!("send ignored: a turn is already in flight");
            return None;
        }

        let human = Message::human(text);
        let pending = Message::pending_ai();
        self.pending_message_id = Some(pending.id.clone());
        self.messages.push(human);
        self.messages.push(pending);
        self.accumulator.clear();
        self.phase = SessionPhase::Sending;

        let stream_id = self.start_new_stream();
        Some(StreamParams {
            client,
            message: text.to_string(),
            thread_id: self.thread_id.clone(),
            cancel_token: self.cancel_token.clone(),
            stream_id,
        })
    }

    /// Folds one stream event into the session. Events whose `stream_id`
    /// no longer matches the current generation are dropped, so chunks
    /// from a stopped or superseded turn can never touch the message
    /// list.
    pub fn apply(&mut self, event: StreamEvent, stream_id: u64) -> SessionUpdate {
        if stream_id != self.current_stream_id {
            debug!(stream_id, "dropping event from superseded stream");
            return SessionUpdate::Ignored;
        }

        match event {
            StreamEvent::Chunk(text) => {
                self.accumulator.push_str(&text);
                let content = self.accumulator.clone();
                self.overwrite_pending(content);
                SessionUpdate::Chunk(text)
            }
            StreamEvent::Completed(summary) => {
                let new_thread_id = summary
                    .thread_id
                    .filter(|id| Some(id.as_str()) != self.thread_id.as_deref());
                if let Some(id) = &new_thread_id {
                    self.thread_id = Some(id.clone());
                }
                self.todos = summary.todos;
                self.files = summary.files;
                self.finish_stream();
                SessionUpdate::Completed { new_thread_id }
            }
            StreamEvent::Error(message) => {
                // Partial content stays visible; only a reply that never
                // got off the ground is replaced by the apology.
                if self.accumulator.is_empty() {
                    self.overwrite_pending(FALLBACK_REPLY.to_string());
                }
                self.finish_stream();
                SessionUpdate::Failed(message)
            }
        }
    }

    /// Cancels the in-flight turn, if any. The transport task observes
    /// the token; the generation bump makes sure any events it already
    /// sent are dropped by `apply`.
    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        self.current_stream_id += 1;
        self.phase = SessionPhase::Idle;
        self.pending_message_id = None;
    }

    /// Makes `thread_id` the active thread, aborting any in-flight turn
    /// and replacing the message list wholesale with that thread's
    /// history. `None` resets the session to a blank conversation.
    pub async fn switch_thread(&mut self, thread_id: Option<String>) {
        self.stop();
        self.thread_id = thread_id;
        self.reload_history().await;
    }

    async fn reload_history(&mut self) {
        let (Some(client), Some(thread_id)) = (self.client.as_ref(), self.thread_id.as_deref())
        else {
            self.messages.clear();
            return;
        };

        match client.get_thread_history(thread_id).await {
            Ok(history) => self.messages = history,
            Err(err) => {
                warn!(%err, thread = thread_id, "failed to load thread history");
                self.messages.clear();
            }
        }
    }

    fn start_new_stream(&mut self) -> u64 {
        self.cancel_token.cancel();
        self.cancel_token = CancellationToken::new();
        self.current_stream_id += 1;
        self.current_stream_id
    }

    fn finish_stream(&mut self) {
        self.phase = SessionPhase::Idle;
        self.pending_message_id = None;
    }

    fn overwrite_pending(&mut self, content: String) {
        let Some(id) = &self.pending_message_id else {
            return;
        };
        if let Some(message) = self.messages.iter_mut().find(|message| &message.id == id) {
            message.content = content;
        }
    }
}

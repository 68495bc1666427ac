use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{Message, MessageKind, StreamFrame, TurnSummary};
use crate::core::client::AgentClient;
use crate::core::config::Transport;
use crate::error::ClientError;

const AI_CHUNK_WORDS: usize = 3;
const AI_CHUNK_PAUSE: Duration = Duration::from_millis(30);
const TOOL_CHUNK_PAUSE: Duration = Duration::from_millis(100);
const MESSAGE_SEPARATOR: &str = "\n\n";
const TOOL_MARKER: char = '🔧';

#[derive(Clone, Debug)]
pub enum StreamEvent {
    Chunk(String),
    Completed(TurnSummary),
    Error(String),
}

pub struct StreamParams {
    pub client: AgentClient,
    pub message: String,
    pub thread_id: Option<String>,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// How a turn's chunks reach the event channel. Every strategy emits zero
/// or more `Chunk`s followed by exactly one `Completed` or `Error`, unless
/// cancelled first.
#[async_trait]
pub trait TransportStrategy: Send + Sync {
    async fn run(&self, params: StreamParams, tx: &mpsc::UnboundedSender<(StreamEvent, u64)>);
}

fn strategy_for(transport: Transport) -> &'static dyn TransportStrategy {
    match transport {
        Transport::Replay => &ReplaySimulated,
        Transport::Incremental => &TrueIncremental,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReplayStep {
    text: String,
    pause: Duration,
}

/// Turns a finished backend turn into the paced chunk sequence the replay
/// transport emits. AI content is split on single spaces and regrouped
/// three words at a time, so concatenating the chunks reproduces the
/// content byte for byte; tool results become one marked chunk each.
/// Human messages and empty content produce nothing.
fn build_replay_plan(messages: &[Message]) -> Vec<ReplayStep> {
    let mut plan = Vec::new();
    for message in messages {
        match message.kind {
            MessageKind::Ai => {
                if message.content.is_empty() {
                    continue;
                }
                let words: Vec<&str> = message.content.split(' ').collect();
                let mut index = 0;
                while index < words.len() {
                    let end = (index + AI_CHUNK_WORDS).min(words.len());
                    let mut text = words[index..end].join(" ");
                    if end < words.len() {
                        text.push(' ');
                    }
                    plan.push(ReplayStep {
                        text,
                        pause: AI_CHUNK_PAUSE,
                    });
                    index = end;
                }
                plan.push(ReplayStep {
                    text: MESSAGE_SEPARATOR.to_string(),
                    pause: Duration::ZERO,
                });
            }
            MessageKind::Tool => {
                if message.content.is_empty() {
                    continue;
                }
                plan.push(ReplayStep {
                    text: format!("\n{TOOL_MARKER} {}{MESSAGE_SEPARATOR}", message.content),
                    pause: TOOL_CHUNK_PAUSE,
                });
            }
            MessageKind::Human => {}
        }
    }
    plan
}

async fn emit_replay(
    plan: Vec<ReplayStep>,
    tx: &mpsc::UnboundedSender<(StreamEvent, u64)>,
    stream_id: u64,
) {
    for step in plan {
        let _ = tx.send((StreamEvent::Chunk(step.text), stream_id));
        if !step.pause.is_zero() {
            tokio::time::sleep(step.pause).await;
        }
    }
}

/// Fetches the whole turn over plain `/chat`, then replays it as paced
/// chunks. This is the default while the backend's SSE endpoint stays
/// dormant.
pub struct ReplaySimulated;

#[async_trait]
impl TransportStrategy for ReplaySimulated {
    async fn run(&self, params: StreamParams, tx: &mpsc::UnboundedSender<(StreamEvent, u64)>) {
        let StreamParams {
            client,
            message,
            thread_id,
            stream_id,
            ..
        } = params;

        match client.send_message(&message, thread_id.as_deref()).await {
            Ok(response) => {
                let plan = build_replay_plan(&response.messages);
                debug!(steps = plan.len(), "replaying finished turn");
                emit_replay(plan, tx, stream_id).await;
                let _ = tx.send((StreamEvent::Completed(TurnSummary::from(response)), stream_id));
            }
            Err(err) => {
                let _ = tx.send((StreamEvent::Error(err.to_string()), stream_id));
            }
        }
    }
}

/// Consumes `/chat/stream` frame by frame.
pub struct TrueIncremental;

#[async_trait]
impl TransportStrategy for TrueIncremental {
    async fn run(&self, params: StreamParams, tx: &mpsc::UnboundedSender<(StreamEvent, u64)>) {
        let StreamParams {
            client,
            message,
            thread_id,
            cancel_token,
            stream_id,
        } = params;

        let response = match client.open_stream(&message, thread_id.as_deref()).await {
            Ok(response) => response,
            Err(err) => {
                let _ = tx.send((StreamEvent::Error(err.to_string()), stream_id));
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            if cancel_token.is_cancelled() {
                return;
            }

            let chunk_bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    let _ = tx.send((
                        StreamEvent::Error(ClientError::from(err).to_string()),
                        stream_id,
                    ));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk_bytes);

            while let Some(newline_pos) = memchr(b'\n', &buffer) {
                let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                    Ok(s) => s.trim(),
                    Err(err) => {
                        warn!(%err, "invalid UTF-8 in stream");
                        buffer.drain(..=newline_pos);
                        continue;
                    }
                };

                let done = process_stream_line(line, tx, stream_id);
                buffer.drain(..=newline_pos);
                if done {
                    return;
                }
            }
        }
        // EOF without a terminal frame leaves the turn unresolved;
        // `stop()` is the way out.
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(
    payload: &str,
    tx: &mpsc::UnboundedSender<(StreamEvent, u64)>,
    stream_id: u64,
) -> bool {
    if payload.is_empty() {
        return false;
    }

    match serde_json::from_str::<StreamFrame>(payload) {
        Ok(StreamFrame::TextChunk { content }) => {
            let _ = tx.send((StreamEvent::Chunk(content), stream_id));
            false
        }
        Ok(StreamFrame::Complete(summary)) => {
            let _ = tx.send((StreamEvent::Completed(summary), stream_id));
            true
        }
        Ok(StreamFrame::Error { message }) => {
            let _ = tx.send((StreamEvent::Error(message), stream_id));
            true
        }
        Ok(StreamFrame::Start { thread_id }) => {
            debug!(thread = ?thread_id, "stream started");
            false
        }
        Ok(StreamFrame::Phase { phase }) => {
            debug!(%phase, "phase change");
            false
        }
        Err(err) => {
            warn!(%err, payload, "skipping malformed stream frame");
            false
        }
    }
}

fn process_stream_line(
    line: &str,
    tx: &mpsc::UnboundedSender<(StreamEvent, u64)>,
    stream_id: u64,
) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamEvent, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Runs one turn on a background task. The task races the selected
    /// transport against the cancel token; events that outrun a
    /// cancellation still carry the stale `stream_id` and get dropped at
    /// the session.
    pub fn spawn_stream(&self, transport: Transport, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let cancel_token = params.cancel_token.clone();
            let strategy = strategy_for(transport);
            tokio::select! {
                _ = strategy.run(params, &tx) => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{ai_message, human_message, tool_message};

    fn texts(plan: &[ReplayStep]) -> Vec<&str> {
        plan.iter().map(|step| step.text.as_str()).collect()
    }

    #[test]
    fn replay_plan_groups_ai_words_in_threes() {
        let plan = build_replay_plan(&[ai_message("one two three four five")]);

        assert_eq!(texts(&plan), vec!["one two three ", "four five", "\n\n"]);
        assert_eq!(plan[0].pause, AI_CHUNK_PAUSE);
        assert_eq!(plan[1].pause, AI_CHUNK_PAUSE);
        assert_eq!(plan[2].pause, Duration::ZERO);
    }

    #[test]
    fn replay_plan_marks_tool_results() {
        let plan = build_replay_plan(&[
            ai_message("Working on it"),
            tool_message("ls -la"),
            ai_message("Done"),
        ]);

        assert_eq!(
            texts(&plan),
            vec!["Working on it", "\n\n", "\n🔧 ls -la\n\n", "Done", "\n\n"]
        );
        assert_eq!(plan[2].pause, TOOL_CHUNK_PAUSE);
    }

    #[test]
    fn replay_plan_skips_human_and_empty_messages() {
        let plan = build_replay_plan(&[
            human_message("hello there"),
            ai_message(""),
            tool_message(""),
            ai_message("hi"),
        ]);

        assert_eq!(texts(&plan), vec!["hi", "\n\n"]);
    }

    #[test]
    fn replay_chunks_reassemble_the_original_content() {
        // split-on-single-space keeps runs of spaces as empty words, so
        // doubled spaces and embedded newlines survive the round trip
        let content = "alpha  beta\ngamma delta epsilon zeta";
        let plan = build_replay_plan(&[ai_message(content)]);

        let reassembled: String = plan
            .iter()
            .filter(|step| step.pause == AI_CHUNK_PAUSE)
            .map(|step| step.text.as_str())
            .collect();
        assert_eq!(reassembled, content);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_emission_paces_chunks() {
        let (service, mut rx) = ChatStreamService::new();
        let plan = build_replay_plan(&[ai_message("a b c d"), tool_message("done")]);

        let start = tokio::time::Instant::now();
        emit_replay(plan, &service.tx, 7).await;
        // two ai groups at 30ms each, the free separator, one tool at 100ms
        assert_eq!(start.elapsed(), Duration::from_millis(160));

        let mut received = Vec::new();
        while let Ok((event, id)) = rx.try_recv() {
            assert_eq!(id, 7);
            match event {
                StreamEvent::Chunk(text) => received.push(text),
                other => panic!("expected chunk, got {:?}", other),
            }
        }
        assert_eq!(received, vec!["a b c ", "d", "\n\n", "\n🔧 done\n\n"]);
    }

    #[test]
    fn process_stream_line_handles_spacing_variants() {
        let (service, mut rx) = ChatStreamService::new();
        let variants = [
            (r#"data: {"type":"text_chunk","content":"Hello"}"#, "Hello"),
            (r#"data:{"type":"text_chunk","content":"World"}"#, "World"),
        ];

        for (index, (line, expected)) in variants.iter().enumerate() {
            let stream_id = (index + 1) as u64;

            assert!(!process_stream_line(line, &service.tx, stream_id));
            let (event, received_id) = rx.try_recv().expect("expected chunk event");
            assert_eq!(received_id, stream_id);
            match event {
                StreamEvent::Chunk(content) => assert_eq!(content, *expected),
                other => panic!("expected chunk event, got {:?}", other),
            }
        }

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn complete_frame_ends_the_stream() {
        let (service, mut rx) = ChatStreamService::new();
        let line = r#"data: {"type":"complete","thread_id":"t-9","todos":[],"files":{},"metadata":null}"#;

        assert!(process_stream_line(line, &service.tx, 4));

        let (event, received_id) = rx.try_recv().expect("expected completed event");
        assert_eq!(received_id, 4);
        match event {
            StreamEvent::Completed(summary) => {
                assert_eq!(summary.thread_id.as_deref(), Some("t-9"));
            }
            other => panic!("expected completed event, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_frame_ends_the_stream() {
        let (service, mut rx) = ChatStreamService::new();
        let line = r#"data: {"type":"error","message":"agent crashed"}"#;

        assert!(process_stream_line(line, &service.tx, 2));

        let (event, _) = rx.try_recv().expect("expected error event");
        match event {
            StreamEvent::Error(message) => assert_eq!(message, "agent crashed"),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[test]
    fn start_and_phase_frames_emit_nothing() {
        let (service, mut rx) = ChatStreamService::new();

        assert!(!process_stream_line(
            r#"data: {"type":"start","thread_id":"t-1"}"#,
            &service.tx,
            1
        ));
        assert!(!process_stream_line(
            r#"data: {"type":"phase","phase":"planning"}"#,
            &service.tx,
            1
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_frames_are_skipped_without_ending() {
        let (service, mut rx) = ChatStreamService::new();

        assert!(!process_stream_line("data: {not json", &service.tx, 3));
        assert!(!process_stream_line(
            r#"data: {"type":"bogus"}"#,
            &service.tx,
            3
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (service, mut rx) = ChatStreamService::new();

        assert!(!process_stream_line("event: message", &service.tx, 5));
        assert!(!process_stream_line(": keep-alive", &service.tx, 5));
        assert!(!process_stream_line("", &service.tx, 5));
        assert!(!process_stream_line("data:", &service.tx, 5));
        assert!(rx.try_recv().is_err());
    }
}

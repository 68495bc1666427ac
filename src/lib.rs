//! Brook is a client-side session layer for conversational-agent backends.
//!
//! The backend answers a chat turn in one shot; Brook replays that answer to
//! the embedder as paced chunks so the reply reads as if it were streamed, and
//! carries a dormant true-incremental transport behind the same interface for
//! backends that learn to stream for real.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session state machine, backend HTTP access, transport
//!   strategies, and configuration.
//! - [`api`] defines the wire payloads exchanged with the backend (messages,
//!   todo items, chat responses, stream frames) and thread summaries.
//! - [`error`] is the failure taxonomy shared by the client and the session.
//! - [`utils`] holds small pure helpers for URLs and message content.
//!
//! The runtime entrypoint lives in the binary crate (`src/main.rs`), which
//! drives a [`core::session::ChatSession`] from a line-based chat loop.

pub mod api;
pub mod core;
pub mod error;
pub mod utils;

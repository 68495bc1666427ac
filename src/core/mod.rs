pub mod chat_stream;
pub mod client;
pub mod config;
pub mod session;

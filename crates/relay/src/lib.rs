//! Gateway stream relay
//!
//! Relays an upstream token-generation/search event feed to a downstream
//! consumer in real time. The upstream speaks newline-delimited
//! `data: <json>` frames with heterogeneous payload shapes; this crate
//! normalizes them into a fixed event vocabulary and pushes them through a
//! write guard that survives the consumer disappearing mid-stream.
//!
//! The moving parts:
//!
//! - [`ChatUpstream`] opens a chat or search stream, degrading from the
//!   main model to the fallback model when the primary tier fails.
//! - [`normalize`] turns the winning tier's byte stream into
//!   [`StreamEvent`]s, tolerant of frames split at arbitrary byte
//!   boundaries, and stops at the first of: `[DONE]` sentinel, upstream
//!   end, error event, cancellation, downstream disconnect.
//! - [`GuardedSink`] owns the downstream lifecycle explicitly
//!   (`Open → Closing → Closed`); a dead consumer turns writes into no-ops
//!   instead of errors, and closing twice is always safe.
//!
//! One relay task serves one stream; nothing here is shared between
//! concurrent requests except the read-only config and the pooled HTTP
//! client.

pub mod config;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod sink;
pub mod upstream;

pub use crate::config::UpstreamConfig;
pub use crate::error::RelayError;
pub use crate::event::{RelayMode, SearchResult, StreamEvent};
pub use crate::normalizer::{normalize, RelayOutcome, Termination};
pub use crate::sink::{CancelFlag, GuardedSink, SinkState};
pub use crate::upstream::{
    ChatMessage, ChatStreamRequest, ChatUpstream, OpenedStream, SearchStreamRequest,
};

//! Upstream SSE normalization.
//!
//! Consumes a byte stream of newline-delimited `data: <json>` frames and
//! relays them to a [`GuardedSink`] as [`StreamEvent`]s, in source order.
//! Chunk boundaries are arbitrary: a read may end mid-line or mid-UTF-8
//! sequence, so bytes are buffered and only complete lines are decoded.
//! Cancellation is observed once per parsed line, bounding extra work after
//! a cancel to a single in-flight line.

use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};

use crate::event::{classify_payload, RelayMode, SearchResult, StreamEvent};
use crate::sink::{CancelFlag, GuardedSink};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Why the relay stopped. The first of these to occur wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Upstream sent the `data: [DONE]` sentinel.
    Sentinel,
    /// The upstream byte stream ended naturally.
    UpstreamEnd,
    /// An error event was emitted; nothing follows it.
    ErrorEvent,
    /// The caller cancelled the relay.
    Cancelled,
    /// The downstream consumer went away. Not an error.
    Disconnected,
}

impl Termination {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Sentinel => "sentinel",
            Termination::UpstreamEnd => "upstream_end",
            Termination::ErrorEvent => "error_event",
            Termination::Cancelled => "cancelled",
            Termination::Disconnected => "disconnected",
        }
    }
}

/// What one relayed stream produced. The assembled content and citation
/// list is what the persistence collaborator receives once the stream is
/// over; the gateway itself only reports it.
#[derive(Debug)]
pub struct RelayOutcome {
    pub content: String,
    pub citations: Vec<SearchResult>,
    /// Events handed to the guarded sink (including suppressed writes).
    pub events: usize,
    pub termination: Termination,
}

enum LineFlow {
    Continue,
    Stop(Termination),
}

/// Relay `upstream` into `sink` until the first termination condition.
pub async fn normalize<S, E>(
    upstream: S,
    sink: &mut GuardedSink,
    mode: RelayMode,
    cancel: &CancelFlag,
) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    pin_mut!(upstream);

    let mut outcome = RelayOutcome {
        content: String::new(),
        citations: Vec::new(),
        events: 0,
        termination: Termination::UpstreamEnd,
    };
    // Bytes of the current incomplete line: carried between reads, never
    // dropped, never double-processed.
    let mut buffer: Vec<u8> = Vec::new();

    'read: while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                // A broken transport mid-stream is terminal: surface exactly
                // one error frame, then stop.
                let event = StreamEvent::Error {
                    message: format!("upstream stream failed: {err}"),
                };
                outcome.events += 1;
                sink.emit(event).await;
                outcome.termination = Termination::ErrorEvent;
                break 'read;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = buffer.drain(..=newline).collect();
            if cancel.is_cancelled() {
                outcome.termination = Termination::Cancelled;
                break 'read;
            }
            match handle_line(&line_bytes[..newline], mode, sink, &mut outcome).await {
                LineFlow::Continue => {}
                LineFlow::Stop(termination) => {
                    outcome.termination = termination;
                    break 'read;
                }
            }
        }

        // A dead consumer suppressed this read's writes; stop draining at
        // the read boundary so the upstream connection is released.
        if sink.is_closed() {
            outcome.termination = Termination::Disconnected;
            break 'read;
        }
    }

    // A final frame may arrive without a trailing newline.
    if outcome.termination == Termination::UpstreamEnd && !buffer.is_empty() {
        if let LineFlow::Stop(termination) = handle_line(&buffer, mode, sink, &mut outcome).await {
            outcome.termination = termination;
        }
    }

    outcome
}

async fn handle_line(
    raw: &[u8],
    mode: RelayMode,
    sink: &mut GuardedSink,
    outcome: &mut RelayOutcome,
) -> LineFlow {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim_end_matches('\r'),
        Err(err) => {
            tracing::warn!(error = %err, "skipping non-UTF-8 upstream line");
            return LineFlow::Continue;
        }
    };

    // Blank lines are frame separators.
    if line.is_empty() {
        return LineFlow::Continue;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        tracing::trace!("ignoring non-data upstream line");
        return LineFlow::Continue;
    };
    let payload = payload.trim_start();

    if payload == DONE_SENTINEL {
        return LineFlow::Stop(Termination::Sentinel);
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "skipping malformed upstream frame");
            return LineFlow::Continue;
        }
    };

    let Some(event) = classify_payload(&value, mode) else {
        return LineFlow::Continue;
    };

    match &event {
        StreamEvent::Content { text } => outcome.content.push_str(text),
        StreamEvent::SearchResults { results } => outcome.citations.extend(results.clone()),
        _ => {}
    }
    let is_error = event.is_error();
    outcome.events += 1;
    sink.emit(event).await;

    if is_error {
        LineFlow::Stop(Termination::ErrorEvent)
    } else {
        LineFlow::Continue
    }
}

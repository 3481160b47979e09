//! SSE relay endpoints.
//!
//! Each request gets one relay task: it opens the upstream stream through
//! the fallback tiers, normalizes frames, and feeds them to the response
//! channel through a guarded sink. When the client goes away the receiver
//! drops, the sink flips closed, and the relay winds down at the next read
//! boundary — a disconnect is normal completion, not an error.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;

use relay::{
    normalize, CancelFlag, ChatStreamRequest, GuardedSink, OpenedStream, RelayMode,
    SearchStreamRequest, StreamEvent,
};

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;

/// POST /api/v1/generate/stream — relay a chat completion stream.
pub async fn generate_stream(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatStreamRequest>,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if request.messages.is_empty() {
        return Err(ServerError::BadRequest("messages must not be empty".into()));
    }
    if request.messages.iter().any(|m| m.content.trim().is_empty()) {
        return Err(ServerError::BadRequest(
            "message content must not be empty".into(),
        ));
    }

    let opened = state.chat.open_chat(&request).await?;
    Ok(relay_sse(opened, RelayMode::Chat))
}

/// POST /api/v1/search/stream — relay a web-search answer stream.
pub async fn search_stream(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SearchStreamRequest>,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ServerError::BadRequest("query must not be empty".into()));
    }
    if query.chars().count() > 500 {
        return Err(ServerError::BadRequest(
            "query must be at most 500 characters".into(),
        ));
    }

    let opened = state.chat.open_search(&request).await?;
    Ok(relay_sse(opened, RelayMode::Search))
}

/// Spawn the relay task for an opened upstream stream and wrap the event
/// channel as an SSE response.
fn relay_sse(
    opened: OpenedStream,
    mode: RelayMode,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
    let tier = opened.tier;

    tokio::spawn(async move {
        // A dropped receiver (client gone) is observed through the guarded
        // sink; the flag covers explicit caller-driven cancellation.
        let cancel = CancelFlag::new();
        let mut sink = GuardedSink::new(tx);
        let outcome = normalize(opened.into_byte_stream(), &mut sink, mode, &cancel).await;
        sink.close();

        counter!(
            "aigate_streams_total",
            "termination" => outcome.termination.as_str()
        )
        .increment(1);

        // The assembled content and citations are what the persistence
        // collaborator consumes once the stream is over.
        tracing::info!(
            tier = %tier,
            events = outcome.events,
            content_chars = outcome.content.chars().count(),
            citations = outcome.citations.len(),
            termination = outcome.termination.as_str(),
            "stream relay finished"
        );
    });

    let events = futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_wire().to_string())));

    Sse::new(events).keep_alive(KeepAlive::default())
}

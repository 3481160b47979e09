use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How the stream was opened. Search-only event kinds (`search_results`,
/// `status`) are honored only in [`RelayMode::Search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Chat,
    Search,
}

/// One citation entry surfaced by a search-mode stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// The fixed event vocabulary every upstream payload shape normalizes into.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content { text: String },
    SearchResults { results: Vec<SearchResult> },
    Status { message: String },
    Error { message: String },
}

impl StreamEvent {
    /// Outbound wire payload for the downstream SSE envelope.
    pub fn to_wire(&self) -> Value {
        match self {
            StreamEvent::Content { text } => json!({ "content": text }),
            StreamEvent::SearchResults { results } => {
                json!({ "type": "search_results", "results": results })
            }
            StreamEvent::Status { message } => json!({ "type": "status", "message": message }),
            StreamEvent::Error { message } => json!({ "error": message }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error { .. })
    }
}

/// Normalize one upstream JSON payload into an event, or `None` when the
/// payload carries nothing for this mode (unknown types, search-only events
/// on a chat stream, upstream bookkeeping frames).
pub fn classify_payload(value: &Value, mode: RelayMode) -> Option<StreamEvent> {
    match value.get("type").and_then(Value::as_str) {
        Some("content") => content_event(value),
        Some("search_results") => {
            if mode == RelayMode::Search {
                Some(StreamEvent::SearchResults {
                    results: parse_results(value),
                })
            } else {
                tracing::debug!("ignoring search_results frame outside search mode");
                None
            }
        }
        Some("status") => {
            if mode == RelayMode::Search {
                Some(StreamEvent::Status {
                    message: string_field(value, "message").unwrap_or_default(),
                })
            } else {
                None
            }
        }
        Some("error") => Some(error_event(value)),
        Some(other) => {
            tracing::debug!(kind = other, "ignoring unknown upstream frame type");
            None
        }
        // No `type` tag: accept the bare `content` / `error` shapes.
        None => {
            if value.get("content").is_some() {
                content_event(value)
            } else if value.get("error").is_some() {
                Some(error_event(value))
            } else {
                None
            }
        }
    }
}

fn content_event(value: &Value) -> Option<StreamEvent> {
    string_field(value, "content").map(|text| StreamEvent::Content { text })
}

fn error_event(value: &Value) -> StreamEvent {
    // Upstreams disagree on the field name: some send `error`, some `message`.
    let message = string_field(value, "error")
        .or_else(|| string_field(value, "message"))
        .unwrap_or_else(|| "upstream error".to_string());
    StreamEvent::Error { message }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn parse_results(value: &Value) -> Vec<SearchResult> {
    let Some(items) = value.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            Some(SearchResult {
                title: item.get("title")?.as_str()?.to_owned(),
                url: string_field(item, "url").unwrap_or_default(),
                // Search providers send full text under `content`; the
                // outbound contract calls it `snippet`.
                snippet: string_field(item, "snippet")
                    .or_else(|| string_field(item, "content"))
                    .unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_content_frame() {
        let value = json!({ "type": "content", "content": "hello" });
        assert_eq!(
            classify_payload(&value, RelayMode::Chat),
            Some(StreamEvent::Content {
                text: "hello".into()
            })
        );
    }

    #[test]
    fn bare_content_frame() {
        let value = json!({ "content": "RAG " });
        assert_eq!(
            classify_payload(&value, RelayMode::Chat),
            Some(StreamEvent::Content { text: "RAG ".into() })
        );
    }

    #[test]
    fn bare_error_frame() {
        let value = json!({ "error": "rate limited" });
        let event = classify_payload(&value, RelayMode::Chat).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "rate limited".into()
            }
        );
        assert!(event.is_error());
    }

    #[test]
    fn typed_error_uses_message_field() {
        let value = json!({ "type": "error", "message": "not found" });
        assert_eq!(
            classify_payload(&value, RelayMode::Search),
            Some(StreamEvent::Error {
                message: "not found".into()
            })
        );
    }

    #[test]
    fn search_results_gated_by_mode() {
        let value = json!({
            "type": "search_results",
            "results": [{ "title": "T", "url": "https://x", "content": "body" }],
            "total": 1
        });

        assert_eq!(classify_payload(&value, RelayMode::Chat), None);

        let event = classify_payload(&value, RelayMode::Search).unwrap();
        match event {
            StreamEvent::SearchResults { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].title, "T");
                assert_eq!(results[0].snippet, "body");
            }
            other => panic!("expected search results, got {other:?}"),
        }
    }

    #[test]
    fn status_gated_by_mode() {
        let value = json!({ "type": "status", "message": "searching" });
        assert_eq!(classify_payload(&value, RelayMode::Chat), None);
        assert_eq!(
            classify_payload(&value, RelayMode::Search),
            Some(StreamEvent::Status {
                message: "searching".into()
            })
        );
    }

    #[test]
    fn unknown_type_ignored() {
        let value = json!({ "type": "done", "stats": { "chunks": 3 } });
        assert_eq!(classify_payload(&value, RelayMode::Chat), None);
        assert_eq!(classify_payload(&value, RelayMode::Search), None);
    }

    #[test]
    fn wire_shapes() {
        let content = StreamEvent::Content { text: "hi".into() };
        assert_eq!(content.to_wire(), json!({ "content": "hi" }));

        let error = StreamEvent::Error {
            message: "boom".into(),
        };
        assert_eq!(error.to_wire(), json!({ "error": "boom" }));

        let status = StreamEvent::Status {
            message: "working".into(),
        };
        assert_eq!(
            status.to_wire(),
            json!({ "type": "status", "message": "working" })
        );
    }
}

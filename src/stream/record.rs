//! Lightweight inspection of streamed records for logging.
//!
//! Records are passed through untouched; this only peeks at the JSON to tell
//! tweets apart from in-band error notices such as operational disconnects.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<TweetData>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    title: Option<String>,
    detail: Option<String>,
}

/// What a record looks like to the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordKind {
    /// A tweet payload, with its id when present.
    Tweet { id: Option<String> },
    /// An error notice delivered inside the stream body.
    Errors { messages: Vec<String> },
    /// Valid JSON of an unknown shape, or not JSON at all.
    Unrecognized,
}

/// Classifies a record without validating or altering it.
pub(crate) fn inspect_record(record: &[u8]) -> RecordKind {
    let Ok(envelope) = serde_json::from_slice::<Envelope>(record) else {
        return RecordKind::Unrecognized;
    };
    if let Some(data) = envelope.data {
        return RecordKind::Tweet { id: data.id };
    }
    match envelope.errors {
        Some(errors) if !errors.is_empty() => RecordKind::Errors {
            messages: errors.into_iter().map(describe_error).collect(),
        },
        _ => RecordKind::Unrecognized,
    }
}

fn describe_error(error: ApiError) -> String {
    match (error.title, error.detail) {
        (Some(title), Some(detail)) => format!("{title}: {detail}"),
        (Some(text), None) | (None, Some(text)) => text,
        (None, None) => "unknown error".to_string(),
    }
}

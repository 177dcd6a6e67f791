//! Messages exchanged between executors.
//!
//! A [`Message`] is an immutable payload tagged with a *kind* (the key the
//! receiving executor uses to pick a handler) and the id of the executor that
//! produced it. Every delivery gets its own clone, so consumers never share
//! mutable state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known payload kinds.
pub mod kinds {
    /// Plain text, e.g. a user prompt.
    pub const TEXT: &str = "text";
    /// The success payload of a wrapped [`Worker`](crate::Worker).
    pub const WORKER_RESULT: &str = "worker_result";
    /// A handler failure routed along an error edge.
    pub const ERROR: &str = "error";
    /// Wildcard used when registering handlers.
    pub const ANY: &str = "*";
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Immutable typed payload passed between executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    kind: String,
    payload: Value,
    origin: String,
}

impl Message {
    /// Origin recorded on messages supplied by the caller of a run.
    pub const INPUT_ORIGIN: &'static str = "$input";

    /// Create an external input message.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            origin: Self::INPUT_ORIGIN.to_owned(),
        }
    }

    /// Create a `text` input message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(kinds::TEXT, Value::String(text.into()))
    }

    /// Create a message emitted by `origin`.
    pub fn from_executor(origin: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            origin: origin.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Id of the executor that emitted this message, or [`Message::INPUT_ORIGIN`].
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The payload as text, if it is a JSON string.
    pub fn as_text(&self) -> Option<&str> {
        self.payload.as_str()
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// What a single handler invocation receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// One message from a direct or fan-out edge.
    Single(Message),
    /// One complete fan-in wave, in source-declaration order.
    Batch(Vec<Message>),
}

impl Input {
    /// The dispatch key this input resolves against, before wildcard fallback.
    pub fn key(&self) -> HandlerKey {
        match self {
            Input::Single(message) => HandlerKey::One(message.kind().to_owned()),
            Input::Batch(messages) => {
                let kind = match messages.split_first() {
                    Some((first, rest)) if rest.iter().all(|m| m.kind() == first.kind()) => {
                        first.kind().to_owned()
                    }
                    _ => kinds::ANY.to_owned(),
                };
                HandlerKey::Batch(kind)
            }
        }
    }

    /// Flatten into the delivered messages.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Input::Single(message) => vec![message],
            Input::Batch(messages) => messages,
        }
    }
}

// ---------------------------------------------------------------------------
// HandlerKey
// ---------------------------------------------------------------------------

/// Entry in an executor's dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "shape", content = "kind", rename_all = "snake_case")]
pub enum HandlerKey {
    /// Accepts a single message of this kind.
    One(String),
    /// Accepts a fan-in batch whose messages all have this kind.
    Batch(String),
}

impl HandlerKey {
    /// The same shape with the wildcard kind.
    pub fn wildcard(&self) -> HandlerKey {
        match self {
            HandlerKey::One(_) => HandlerKey::One(kinds::ANY.to_owned()),
            HandlerKey::Batch(_) => HandlerKey::Batch(kinds::ANY.to_owned()),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, HandlerKey::Batch(_))
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKey::One(kind) => write!(f, "{kind}"),
            HandlerKey::Batch(kind) => write!(f, "list<{kind}>"),
        }
    }
}

//! Inbound messages

mod canonical;

pub use canonical::{is_canonical, to_canonical};

use crate::output::OutputPool;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Metadata flag set once a message is known to be addressed to the assistant
pub const IS_DIRECT_KEY: &str = "is_direct";

pub type Meta = HashMap<String, Value>;

/// A message received from a transport, or a slice of one.
#[derive(Clone)]
pub struct InboundMessage {
    text: String,
    raw_text: String,
    meta: Meta,
    outputs: Arc<dyn OutputPool>,
    original: Option<Arc<InboundMessage>>,
}

impl InboundMessage {
    /// Message as received from a transport; `text` is canonicalized.
    pub fn plain(text: impl Into<String>, outputs: Arc<dyn OutputPool>) -> Self {
        let raw_text = text.into();
        Self {
            text: to_canonical(&raw_text),
            raw_text,
            meta: Meta::new(),
            outputs,
            original: None,
        }
    }

    /// Message carrying only part of `parent`'s text.
    ///
    /// Metadata and outputs are inherited. [`InboundMessage::original`]
    /// still points at the message the transport delivered.
    pub fn partial(parent: &InboundMessage, text: &str) -> Self {
        Self {
            text: to_canonical(text),
            raw_text: text.to_string(),
            meta: parent.meta.clone(),
            outputs: Arc::clone(&parent.outputs),
            original: Some(parent.original_handle()),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Canonical text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Outputs related to this message, e.g. the chat it came from
    pub fn outputs(&self) -> &Arc<dyn OutputPool> {
        &self.outputs
    }

    pub fn is_direct(&self) -> bool {
        self.meta
            .get(IS_DIRECT_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn original(&self) -> &InboundMessage {
        self.original.as_deref().unwrap_or(self)
    }

    fn original_handle(&self) -> Arc<InboundMessage> {
        match &self.original {
            Some(original) => Arc::clone(original),
            None => Arc::new(self.clone()),
        }
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("text", &self.text)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

//! Dialog error types

use crate::command_tree::CommandTreeError;
use crate::config::ConfigError;
use crate::output::ChannelKind;
use thiserror::Error;

/// Errors raised while driving a conversation.
#[derive(Debug, Error)]
pub enum DialogError {
    /// Command lookup or command registration failed
    #[error(transparent)]
    CommandTree(#[from] CommandTreeError),

    /// A context source of an unsupported shape was passed to the constructor
    #[error("cannot construct a dialog context from {kind}: {value}")]
    UnsupportedSource { kind: &'static str, value: String },

    /// Integration bug, e.g. asking for the current message outside of a turn
    #[error("usage error: {0}")]
    Usage(String),

    #[error("no {0} output channel available")]
    OutputNotFound(ChannelKind),

    /// An output collaborator failed to deliver
    #[error("output failed: {0}")]
    Output(String),

    /// Injected into a suspended script when the conversation times out.
    /// A script that lets it escape ends the dialog silently.
    #[error("dialog timed out while waiting for a reply")]
    TimedOut,

    /// A skill handler failed
    #[error("handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DialogError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }

    /// True for the distinguished timeout signal
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguished() {
        assert!(DialogError::TimedOut.is_timeout());
        assert!(!DialogError::handler("boom").is_timeout());
    }

    #[test]
    fn test_tree_errors_are_transparent() {
        let err: DialogError = CommandTreeError::NoMatch {
            text: "включи свет".to_string(),
        }
        .into();
        assert!(err.to_string().contains("\"включи свет\""));
    }
}

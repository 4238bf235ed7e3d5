use super::{DialogContext, Next};
use crate::api::AssistantApi;
use crate::command_tree::{CommandTree, CommandTreeError};
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Routes commands through a [`CommandTree`].
///
/// The matched context receives only the unmatched remainder of the text.
/// Unrecognized and ambiguous commands go to their fallback contexts; with
/// no fallback the tree context stays current.
pub struct CommandTreeContext {
    tree: CommandTree<Arc<dyn DialogContext>>,
    unknown: Next,
    ambiguous: Next,
}

impl CommandTreeContext {
    /// `ambiguous` defaults to `unknown`
    pub fn new(tree: CommandTree<Arc<dyn DialogContext>>, unknown: Next, ambiguous: Next) -> Self {
        let ambiguous = ambiguous.or_else(|| unknown.clone());
        Self {
            tree,
            unknown,
            ambiguous,
        }
    }

    fn fall_back(
        self: Arc<Self>,
        fallback: Next,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        match fallback {
            Some(context) => context.handle_command(api, message),
            None => Ok(Some(self)),
        }
    }
}

impl fmt::Debug for CommandTreeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTreeContext")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl DialogContext for CommandTreeContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        let lookup = self
            .tree
            .get_command(message.text())
            .map(|(context, rest)| (Arc::clone(context), rest));

        match lookup {
            Ok((context, rest)) => context.handle_command(api, &InboundMessage::partial(message, &rest)),
            Err(e @ CommandTreeError::NoMatch { .. }) => {
                tracing::info!(error = %e, "Command not recognized");
                let fallback = self.unknown.clone();
                self.fall_back(fallback, api, message)
            }
            Err(e @ CommandTreeError::Ambiguous { .. }) => {
                tracing::info!(error = %e, "Command is ambiguous");
                let fallback = self.ambiguous.clone();
                self.fall_back(fallback, api, message)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle_timeout(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(None)
    }

    fn handle_interrupt(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(Some(self))
    }

    fn handle_restore(self: Arc<Self>, _api: &dyn AssistantApi) -> Result<Next, DialogError> {
        Ok(Some(self))
    }

    fn timeout(&self, default: Duration) -> Duration {
        default
    }
}

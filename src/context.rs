//! Dialog contexts
//!
//! A context decides how the next turn of a conversation is handled. Each
//! operation returns the context that takes over afterwards: the same `Arc`
//! to stay, another context to move on, or `None` to end the dialog and
//! fall back to the conversation's default context.

mod aliases;
mod construct;
mod function;
mod interrupt;
mod script;
mod tree;
mod trigger;
mod wrapper;

pub use aliases::{AliasConfig, AliasList, AliasResolutionContext, CommandAliases};
pub use construct::{
    construct_context, CommandMap, ContextSource, AMBIGUOUS_COMMAND_KEY, UNKNOWN_COMMAND_KEY,
};
pub(crate) use construct::TreeDefinition;
pub use function::{FunctionContext, FunctionContextWithArgs, Handled, Handler, HandlerWithArg};
pub use interrupt::InterruptContext;
pub use script::{GeneratorContext, Reply, Resume, Script, ScriptStep};
pub use tree::CommandTreeContext;
pub use trigger::TriggerPhraseContext;
pub use wrapper::{CommandErrorInterceptionContext, TimeoutOverrideContext};

use crate::api::AssistantApi;
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Context to continue with, `None` ends the dialog
pub type Next = Option<Arc<dyn DialogContext>>;

pub trait DialogContext: Send + Sync + Debug {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError>;

    /// Called when no command arrived within [`DialogContext::timeout`]
    fn handle_timeout(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError>;

    /// Called before an assistant-initiated interaction takes over.
    /// The returned context is restored once the interaction ends.
    fn handle_interrupt(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError>;

    fn handle_restore(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError>;

    /// How long to wait for the next command, given the configured default
    fn timeout(&self, default: Duration) -> Duration;
}

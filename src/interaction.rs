//! Assistant-initiated interactions
//!
//! An active interaction starts a dialog without a user command, e.g. a
//! timer going off. It interrupts whatever dialog is current and may leave
//! a context of its own that runs until it ends.

use crate::api::{ApiExt, ApiExtProvider, AssistantApi};
use crate::context::{Handled, Next};
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::fmt;
use std::sync::Arc;

pub trait ActiveInteraction: Send + Sync + fmt::Debug {
    /// Do whatever the assistant wanted to do and return the context
    /// continuing the interaction, if any.
    fn act(&self, api: &dyn AssistantApi) -> Result<Next, DialogError>;
}

type InteractionFn = dyn Fn(&ApiExt<'_>) -> Result<Handled, DialogError> + Send + Sync;

/// Function started as an active interaction
#[derive(Clone)]
pub struct InteractionHandler {
    name: String,
    f: Arc<InteractionFn>,
}

impl InteractionHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ApiExt<'_>) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<F>(), f)
    }

    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ApiExt<'_>) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for InteractionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub enum InteractionSource {
    Ready(Arc<dyn ActiveInteraction>),
    Function(InteractionHandler),
}

impl InteractionSource {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&ApiExt<'_>) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        Self::Function(InteractionHandler::new(f))
    }
}

impl From<Arc<dyn ActiveInteraction>> for InteractionSource {
    fn from(interaction: Arc<dyn ActiveInteraction>) -> Self {
        Self::Ready(interaction)
    }
}

impl From<InteractionHandler> for InteractionSource {
    fn from(handler: InteractionHandler) -> Self {
        Self::Function(handler)
    }
}

/// Runs an [`InteractionHandler`] with a fresh extended API.
///
/// The related message, if any, is what [`ApiExt::message`] returns and
/// whose outputs are preferred for replies.
#[derive(Debug)]
pub struct FunctionInteraction {
    handler: InteractionHandler,
    related: Option<InboundMessage>,
}

impl FunctionInteraction {
    pub fn new(handler: InteractionHandler, related: Option<InboundMessage>) -> Self {
        Self { handler, related }
    }
}

impl ActiveInteraction for FunctionInteraction {
    fn act(&self, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let ext = ApiExtProvider::default();
        ext.set_message(self.related.clone());
        let outcome = (self.handler.f)(&ext.using(api))?;
        ext.next_from_outcome(api, outcome, None)
    }
}

pub fn construct_active_interaction(
    source: InteractionSource,
    related: Option<InboundMessage>,
) -> Arc<dyn ActiveInteraction> {
    match source {
        InteractionSource::Ready(interaction) => interaction,
        InteractionSource::Function(handler) => Arc::new(FunctionInteraction::new(handler, related)),
    }
}

//! Assistant API surface seen by contexts and skill handlers
//!
//! [`AssistantApi`] is what the conversation state machine hands to every
//! context. Function and script handlers get the richer [`ApiExt`], which
//! also knows the message being handled and lets the handler pick the next
//! context.

use crate::context::{
    construct_context, ContextSource, DialogContext, GeneratorContext, Handled, Next,
    TimeoutOverrideContext,
};
use crate::error::DialogError;
use crate::interaction::InteractionSource;
use crate::message::InboundMessage;
use crate::output::{prefer, OutputPool};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub trait AssistantApi: Send + Sync {
    /// All outputs currently known to the assistant
    fn outputs(&self) -> Arc<dyn OutputPool>;

    /// Start an assistant-initiated interaction.
    ///
    /// Runs synchronously under the conversation lock, so it must not be
    /// called from inside a context handler of the same conversation.
    fn submit_active_interaction(
        &self,
        interaction: InteractionSource,
        related_message: Option<InboundMessage>,
    ) -> Result<(), DialogError>;

    fn say(&self, text: &str) -> Result<(), DialogError> {
        self.outputs().text()?.send(text)
    }

    fn play_audio(&self, path: &Path) -> Result<(), DialogError> {
        self.outputs().audio()?.send_file(path)
    }
}

#[derive(Default)]
struct Scratch {
    next_context: Next,
    timeout_override: Option<Duration>,
    message: Option<InboundMessage>,
}

/// Scratch state shared between a handler and the context wrapping it.
///
/// Cloning shares the state: a context created through
/// [`ApiExt::context_set`] keeps the provider of the handler that created
/// it, along with any timeout override still pending.
#[derive(Clone, Default)]
pub struct ApiExtProvider {
    scratch: Arc<Mutex<Scratch>>,
}

impl fmt::Debug for ApiExtProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiExtProvider")
    }
}

impl ApiExtProvider {
    fn scratch(&self) -> MutexGuard<'_, Scratch> {
        self.scratch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_message(&self, message: Option<InboundMessage>) {
        self.scratch().message = message;
    }

    pub fn set_timeout_override(&self, timeout: Duration) {
        self.scratch().timeout_override = Some(timeout);
    }

    fn request_next_context(&self, context: Arc<dyn DialogContext>, timeout: Option<Duration>) {
        let mut scratch = self.scratch();
        scratch.next_context = Some(context);
        scratch.timeout_override = timeout;
    }

    /// Resolve the context to continue with and clear pending requests.
    ///
    /// A context requested by the handler wins over `default`. A pending
    /// timeout override wraps whichever context is chosen.
    pub fn take_next_context(&self, default: Next) -> Next {
        let (requested, timeout) = {
            let mut scratch = self.scratch();
            (scratch.next_context.take(), scratch.timeout_override.take())
        };

        let next = requested.or(default)?;
        Some(match timeout {
            Some(timeout) => Arc::new(TimeoutOverrideContext::new(next, timeout)) as Arc<dyn DialogContext>,
            None => next,
        })
    }

    /// Turn a handler's outcome into the next context.
    pub fn next_from_outcome(
        &self,
        api: &dyn AssistantApi,
        outcome: Handled,
        default: Next,
    ) -> Result<Next, DialogError> {
        match outcome {
            Handled::Script(script) => GeneratorContext::start(script, self.clone(), api),
            Handled::Done => Ok(self.take_next_context(default)),
        }
    }

    pub fn using<'a>(&'a self, api: &'a dyn AssistantApi) -> ApiExt<'a> {
        ApiExt {
            api,
            provider: self,
        }
    }
}

/// Extended API for function and script handlers.
pub struct ApiExt<'a> {
    api: &'a dyn AssistantApi,
    provider: &'a ApiExtProvider,
}

impl ApiExt<'_> {
    /// The message that triggered the running handler.
    ///
    /// Fails with a usage error inside interactions not linked to a message.
    pub fn message(&self) -> Result<InboundMessage, DialogError> {
        self.provider.scratch().message.clone().ok_or_else(|| {
            DialogError::usage("message requested outside of a command handler")
        })
    }

    /// Hand the next turn to a context built from `source`.
    ///
    /// `timeout` overrides the conversation's default reply timeout for
    /// that context.
    pub fn context_set(
        &self,
        source: impl Into<ContextSource>,
        timeout: Option<Duration>,
    ) -> Result<(), DialogError> {
        let context = construct_context(source.into(), Some(self.provider))?;
        self.provider.request_next_context(context, timeout);
        Ok(())
    }

    /// Speak through a speech channel, if one is available.
    pub fn say_speech(&self, text: &str) -> Result<(), DialogError> {
        self.prefer_relevant(|pool| pool.speech())?.send(text)
    }

    fn prefer_relevant<T>(
        &self,
        pick: impl Fn(&dyn OutputPool) -> Result<T, DialogError>,
    ) -> Result<T, DialogError> {
        let general = self.api.outputs();
        let relevant = self.provider.scratch().message.as_ref().map(|m| Arc::clone(m.outputs()));
        match relevant {
            Some(relevant) => prefer(relevant.as_ref(), general.as_ref(), pick),
            None => pick(general.as_ref()),
        }
    }
}

impl AssistantApi for ApiExt<'_> {
    fn outputs(&self) -> Arc<dyn OutputPool> {
        self.api.outputs()
    }

    /// Attaches the message being handled when no related message is given.
    fn submit_active_interaction(
        &self,
        interaction: InteractionSource,
        related_message: Option<InboundMessage>,
    ) -> Result<(), DialogError> {
        let related_message = related_message.or_else(|| self.provider.scratch().message.clone());
        self.api.submit_active_interaction(interaction, related_message)
    }

    fn say(&self, text: &str) -> Result<(), DialogError> {
        self.prefer_relevant(|pool| pool.text())?.send(text)
    }

    fn play_audio(&self, path: &Path) -> Result<(), DialogError> {
        self.prefer_relevant(|pool| pool.audio())?.send_file(path)
    }
}

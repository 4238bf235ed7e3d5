//! Contexts that decorate another context

use super::{DialogContext, Next};
use crate::api::AssistantApi;
use crate::error::DialogError;
use crate::message::InboundMessage;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

/// Keep `wrapper` in place while the wrapped context stays current.
///
/// Any other result replaces the wrapper.
pub(crate) fn rewrap(wrapper: Arc<dyn DialogContext>, inner: &Arc<dyn DialogContext>, next: Next) -> Next {
    match next {
        Some(next) if Arc::ptr_eq(&next, inner) => Some(wrapper),
        other => other,
    }
}

/// Replaces the reply timeout of the wrapped context
#[derive(Debug)]
pub struct TimeoutOverrideContext {
    inner: Arc<dyn DialogContext>,
    timeout: Duration,
}

impl TimeoutOverrideContext {
    pub fn new(inner: Arc<dyn DialogContext>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl DialogContext for TimeoutOverrideContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_command(api, message)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn handle_timeout(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_timeout(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn handle_interrupt(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_interrupt(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn handle_restore(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_restore(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn timeout(&self, _default: Duration) -> Duration {
        self.timeout
    }
}

/// Apologizes with a random phrase when the wrapped context fails a command.
///
/// The error is still returned to the caller.
#[derive(Debug)]
pub struct CommandErrorInterceptionContext {
    inner: Arc<dyn DialogContext>,
    phrases: Vec<String>,
}

impl CommandErrorInterceptionContext {
    pub fn new(inner: Arc<dyn DialogContext>, phrases: Vec<String>) -> Result<Self, DialogError> {
        if phrases.is_empty() {
            return Err(DialogError::usage("error interception needs at least one phrase"));
        }
        Ok(Self { inner, phrases })
    }
}

impl DialogContext for CommandErrorInterceptionContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        match Arc::clone(&self.inner).handle_command(api, message) {
            Ok(next) => Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next)),
            Err(e) => {
                tracing::warn!(error = %e, text = %message.text(), "Command failed");
                if let Some(phrase) = self.phrases.choose(&mut rand::thread_rng()) {
                    if let Err(say_error) = api.say(phrase) {
                        tracing::debug!(error = %say_error, "Could not report command failure");
                    }
                }
                Err(e)
            }
        }
    }

    fn handle_timeout(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_timeout(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn handle_interrupt(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_interrupt(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn handle_restore(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.inner).handle_restore(api)?;
        Ok(rewrap(Arc::clone(&self) as Arc<dyn DialogContext>, &self.inner, next))
    }

    fn timeout(&self, default: Duration) -> Duration {
        self.inner.timeout(default)
    }
}

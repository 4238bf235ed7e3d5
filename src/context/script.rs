//! Resumable scripts
//!
//! A script is a skill written as a small state machine: it asks a
//! question, suspends, and resumes with the next command text (or with a
//! timeout signal) once the user answers.

use super::{construct_context, ContextSource, DialogContext, Next};
use crate::api::{ApiExt, ApiExtProvider, AssistantApi};
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Value a suspended script is resumed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Canonical text of the next command
    Reply(String),
    /// No command arrived in time
    Timeout,
}

impl Resume {
    /// The reply text, or [`DialogError::TimedOut`].
    ///
    /// Propagating the error with `?` ends the dialog silently.
    pub fn reply(self) -> Result<String, DialogError> {
        match self {
            Self::Reply(text) => Ok(text),
            Self::Timeout => Err(DialogError::TimedOut),
        }
    }
}

/// What a script produces when it suspends or finishes
pub enum Reply {
    Silent,
    Say(String),
    /// Say the phrase and wait `Duration` for the answer instead of the default
    SayWithTimeout(String, Duration),
    /// Continue in another context instead of this script
    Switch(ContextSource),
    /// Continue in a nested script
    Script(Box<dyn Script>),
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Say(text.to_string())
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Say(text)
    }
}

pub enum ScriptStep {
    /// Suspend and wait for the next command
    Yield(Reply),
    /// Finish the script
    Return(Reply),
}

impl ScriptStep {
    pub fn ask(text: impl Into<String>) -> Self {
        Self::Yield(Reply::Say(text.into()))
    }

    pub fn ask_with_timeout(text: impl Into<String>, timeout: Duration) -> Self {
        Self::Yield(Reply::SayWithTimeout(text.into(), timeout))
    }

    pub fn done(text: impl Into<String>) -> Self {
        Self::Return(Reply::Say(text.into()))
    }

    pub fn finish() -> Self {
        Self::Return(Reply::Silent)
    }
}

pub trait Script: Send {
    /// Advance to the first suspension point
    fn start(&mut self, api: &ApiExt<'_>) -> Result<ScriptStep, DialogError>;

    fn resume(&mut self, api: &ApiExt<'_>, input: Resume) -> Result<ScriptStep, DialogError>;

    /// Shown in logs for the context running this script
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Context driven by a [`Script`].
///
/// Stays current while the script keeps yielding. The provider is kept
/// across turns, so overrides requested by the script apply to it.
pub struct GeneratorContext {
    name: String,
    script: Mutex<Box<dyn Script>>,
    ext: ApiExtProvider,
}

impl fmt::Debug for GeneratorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeneratorContext({})", self.name)
    }
}

impl GeneratorContext {
    /// Run `script` up to its first suspension point.
    ///
    /// Returns `None` when the script finishes without suspending.
    pub fn start(
        script: Box<dyn Script>,
        ext: ApiExtProvider,
        api: &dyn AssistantApi,
    ) -> Result<Next, DialogError> {
        let context = Arc::new(Self {
            name: script.name().to_string(),
            script: Mutex::new(script),
            ext,
        });
        let step = context.script().start(&context.ext.using(api))?;
        context.process_step(api, step)
    }

    fn script(&self) -> MutexGuard<'_, Box<dyn Script>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn process_step(self: Arc<Self>, api: &dyn AssistantApi, step: ScriptStep) -> Result<Next, DialogError> {
        let (reply, default): (Reply, Next) = match step {
            ScriptStep::Yield(reply) => (reply, Some(Arc::clone(&self) as Arc<dyn DialogContext>)),
            ScriptStep::Return(reply) => (reply, None),
        };

        let ext = self.ext.using(api);
        match reply {
            Reply::Silent => {}
            Reply::Say(text) => ext.say(&text)?,
            Reply::SayWithTimeout(text, timeout) => {
                ext.say(&text)?;
                self.ext.set_timeout_override(timeout);
            }
            Reply::Switch(source) => {
                let next = construct_context(source, Some(&self.ext))?;
                return Ok(self.ext.take_next_context(Some(next)));
            }
            Reply::Script(script) => return Self::start(script, self.ext.clone(), api),
        }

        Ok(self.ext.take_next_context(default))
    }
}

impl DialogContext for GeneratorContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        self.ext.set_message(Some(message.clone()));
        let step = self
            .script()
            .resume(&self.ext.using(api), Resume::Reply(message.text().to_string()))?;
        self.process_step(api, step)
    }

    fn handle_timeout(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let step = match self.script().resume(&self.ext.using(api), Resume::Timeout) {
            Ok(step) => step,
            Err(DialogError::TimedOut) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.process_step(api, step)
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

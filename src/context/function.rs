use super::{DialogContext, Next, Script};
use crate::api::{ApiExt, ApiExtProvider, AssistantApi};
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type HandlerFn = dyn Fn(&ApiExt<'_>, &str) -> Result<Handled, DialogError> + Send + Sync;

fn boxed<F>(f: F) -> Arc<HandlerFn>
where
    F: Fn(&ApiExt<'_>, &str) -> Result<Handled, DialogError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a handler did with its turn
pub enum Handled {
    /// Finished; the next context is whatever `context_set` requested
    Done,
    /// Continue as a resumable script, started right away
    Script(Box<dyn Script>),
}

impl Handled {
    pub fn script(script: impl Script + 'static) -> Self {
        Self::Script(Box::new(script))
    }
}

impl fmt::Debug for Handled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Script(script) => write!(f, "Script({})", script.name()),
        }
    }
}

/// Skill function receiving the extended API and the command argument text
#[derive(Clone)]
pub struct Handler {
    name: String,
    f: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ApiExt<'_>, &str) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<F>(), f)
    }

    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ApiExt<'_>, &str) -> Result<Handled, DialogError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: boxed(f),
        }
    }

    /// Handler that only says `reply`
    pub fn reply(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::named(format!("reply({reply:?})"), move |api, _| {
            api.say(&reply)?;
            Ok(Handled::Done)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, api: &ApiExt<'_>, text: &str) -> Result<Handled, DialogError> {
        (self.f)(api, text)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Skill function with one extra bound argument
#[derive(Clone)]
pub struct HandlerWithArg {
    name: String,
    arg: String,
    f: Arc<HandlerFn>,
}

impl HandlerWithArg {
    pub fn new<F, A>(f: F, arg: A) -> Self
    where
        F: Fn(&ApiExt<'_>, &str, &A) -> Result<Handled, DialogError> + Send + Sync + 'static,
        A: fmt::Debug + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<F>().to_string(),
            arg: format!("{arg:?}"),
            f: boxed(move |api, text| f(api, text, &arg)),
        }
    }

    pub fn call(&self, api: &ApiExt<'_>, text: &str) -> Result<Handled, DialogError> {
        (self.f)(api, text)
    }
}

impl fmt::Debug for HandlerWithArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arg)
    }
}

fn run(
    api: &dyn AssistantApi,
    message: &InboundMessage,
    ext: Option<&ApiExtProvider>,
    call: impl FnOnce(&ApiExt<'_>, &str) -> Result<Handled, DialogError>,
) -> Result<Next, DialogError> {
    let ext = ext.cloned().unwrap_or_default();
    ext.set_message(Some(message.clone()));
    let outcome = call(&ext.using(api), message.text())?;
    ext.next_from_outcome(api, outcome, None)
}

/// Calls a handler once per command.
///
/// The dialog ends after the call unless the handler picked a next context
/// or returned a script.
pub struct FunctionContext {
    handler: Handler,
    ext: Option<ApiExtProvider>,
}

impl FunctionContext {
    /// `ext` is shared with the context that created this one, if any
    pub fn new(handler: Handler, ext: Option<ApiExtProvider>) -> Self {
        Self { handler, ext }
    }
}

impl fmt::Debug for FunctionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.handler, f)
    }
}

impl DialogContext for FunctionContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        run(api, message, self.ext.as_ref(), |ext, text| {
            self.handler.call(ext, text)
        })
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

pub struct FunctionContextWithArgs {
    handler: HandlerWithArg,
    ext: Option<ApiExtProvider>,
}

impl FunctionContextWithArgs {
    pub fn new(handler: HandlerWithArg, ext: Option<ApiExtProvider>) -> Self {
        Self { handler, ext }
    }
}

impl fmt::Debug for FunctionContextWithArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.handler, f)
    }
}

impl DialogContext for FunctionContextWithArgs {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        run(api, message, self.ext.as_ref(), |ext, text| {
            self.handler.call(ext, text)
        })
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

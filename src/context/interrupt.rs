use super::{DialogContext, Next};
use crate::api::AssistantApi;
use crate::error::DialogError;
use crate::message::InboundMessage;
use std::sync::Arc;
use std::time::Duration;

/// Runs an assistant-initiated dialog on top of an interrupted one.
///
/// Every operation goes to the interrupting dialog. Once it ends, the
/// interrupted context is restored. The interrupted context must have seen
/// `handle_interrupt` before this is built.
#[derive(Debug)]
pub struct InterruptContext {
    interrupted: Arc<dyn DialogContext>,
    current: Arc<dyn DialogContext>,
}

impl InterruptContext {
    pub fn new(interrupted: Arc<dyn DialogContext>, current: Arc<dyn DialogContext>) -> Self {
        Self {
            interrupted,
            current,
        }
    }

    fn advance(self: Arc<Self>, api: &dyn AssistantApi, next: Next) -> Result<Next, DialogError> {
        match next {
            None => Arc::clone(&self.interrupted).handle_restore(api),
            Some(next) if Arc::ptr_eq(&next, &self.current) => Ok(Some(self)),
            Some(next) => Ok(Some(Arc::new(Self::new(Arc::clone(&self.interrupted), next)))),
        }
    }
}

impl DialogContext for InterruptContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.current).handle_command(api, message)?;
        self.advance(api, next)
    }

    fn handle_timeout(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.current).handle_timeout(api)?;
        self.advance(api, next)
    }

    fn handle_interrupt(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.current).handle_interrupt(api)?;
        self.advance(api, next)
    }

    fn handle_restore(self: Arc<Self>, api: &dyn AssistantApi) -> Result<Next, DialogError> {
        let next = Arc::clone(&self.current).handle_restore(api)?;
        self.advance(api, next)
    }

    fn timeout(&self, default: Duration) -> Duration {
        self.current.timeout(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{message, ContextMock, StubApi};

    fn as_dyn(ctx: &Arc<ContextMock>) -> Arc<dyn DialogContext> {
        Arc::clone(ctx) as Arc<dyn DialogContext>
    }

    #[test]
    fn test_restores_interrupted_when_current_ends() {
        let api = StubApi::new();
        let interrupted = ContextMock::new();
        let current = ContextMock::new();
        let ctx = Arc::new(InterruptContext::new(as_dyn(&interrupted), as_dyn(&current)));

        let next = ctx.handle_command(&api, &message("что-то")).unwrap();
        assert!(next.is_some_and(|next| Arc::ptr_eq(&next, &as_dyn(&interrupted))));
        assert_eq!(interrupted.restores(), 1);
    }

    #[test]
    fn test_stays_while_current_stays() {
        let api = StubApi::new();
        let interrupted = ContextMock::new();
        let current = ContextMock::builder().staying().build();
        let ctx: Arc<dyn DialogContext> =
            Arc::new(InterruptContext::new(as_dyn(&interrupted), as_dyn(&current)));

        let next = Arc::clone(&ctx).handle_command(&api, &message("ещё")).unwrap();
        assert!(next.is_some_and(|next| Arc::ptr_eq(&next, &ctx)));
        assert_eq!(interrupted.restores(), 0);
    }

    #[test]
    fn test_follows_current_transitions() {
        let api = StubApi::new();
        let interrupted = ContextMock::new();
        let second = ContextMock::builder().with_timeout(Duration::from_secs(42)).build();
        let current = ContextMock::builder().on_command("дальше", as_dyn(&second)).build();
        let ctx = Arc::new(InterruptContext::new(as_dyn(&interrupted), as_dyn(&current)));

        let next = ctx.handle_command(&api, &message("дальше")).unwrap().unwrap();
        assert!(format!("{next:?}").starts_with("InterruptContext"));
        assert_eq!(next.timeout(Duration::from_secs(10)), Duration::from_secs(42));

        let restored = next.handle_command(&api, &message("всё")).unwrap();
        assert!(restored.is_some_and(|ctx| Arc::ptr_eq(&ctx, &as_dyn(&interrupted))));
        assert_eq!(second.commands(), vec!["всё".to_string()]);
    }

    #[test]
    fn test_timeout_of_current_restores() {
        let api = StubApi::new();
        let interrupted = ContextMock::new();
        let current = ContextMock::new();
        let ctx = Arc::new(InterruptContext::new(as_dyn(&interrupted), as_dyn(&current)));

        let next = ctx.handle_timeout(&api).unwrap();
        assert!(next.is_some_and(|next| Arc::ptr_eq(&next, &as_dyn(&interrupted))));
    }
}

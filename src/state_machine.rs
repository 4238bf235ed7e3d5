//! Conversation state machine
//!
//! Holds the current dialog context of one conversation and the countdown
//! until its reply timeout. Commands, assistant-initiated interactions and
//! timeout ticks are all serialized by a single lock.

#[cfg(test)]
mod proptests;

use crate::api::AssistantApi;
use crate::context::{DialogContext, InterruptContext, Next};
use crate::error::DialogError;
use crate::interaction::ActiveInteraction;
use crate::message::InboundMessage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct MachineState {
    current: Arc<dyn DialogContext>,
    /// Seconds left until the current context times out
    remaining: f64,
}

pub struct ConversationStateMachine {
    api: Arc<dyn AssistantApi>,
    default_context: Arc<dyn DialogContext>,
    default_timeout: Duration,
    state: Mutex<MachineState>,
}

impl ConversationStateMachine {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        default_context: Arc<dyn DialogContext>,
        default_timeout: Duration,
    ) -> Self {
        let remaining = default_context.timeout(default_timeout).as_secs_f64();
        Self {
            api,
            state: Mutex::new(MachineState {
                current: Arc::clone(&default_context),
                remaining,
            }),
            default_context,
            default_timeout,
        }
    }

    fn state(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `next` current, or the default context when the dialog ended,
    /// and restart the countdown.
    fn install(&self, state: &mut MachineState, next: Next) {
        let ended = next.is_none();
        state.current = next.unwrap_or_else(|| Arc::clone(&self.default_context));
        self.restart_countdown(state);
        tracing::debug!(
            context = ?state.current,
            timeout_secs = state.remaining,
            ended,
            "Dialog context installed"
        );
    }

    fn restart_countdown(&self, state: &mut MachineState) {
        state.remaining = state.current.timeout(self.default_timeout).as_secs_f64();
    }

    /// Handle a user command with the current context.
    ///
    /// # Errors
    ///
    /// Handler errors are returned as-is; the current context is kept then.
    pub fn process_command(&self, message: &InboundMessage) -> Result<(), DialogError> {
        let mut state = self.state();
        let next = Arc::clone(&state.current).handle_command(self.api.as_ref(), message)?;
        self.install(&mut state, next);
        Ok(())
    }

    /// Run an assistant-initiated interaction on top of the current dialog.
    ///
    /// The state is settled even when the interaction fails: the interrupted
    /// dialog is restored, or the default context takes over. The first
    /// error of `act`, `handle_interrupt` and `handle_restore` (in that
    /// order) is returned afterwards.
    pub fn process_active_interaction(
        &self,
        interaction: &dyn ActiveInteraction,
    ) -> Result<(), DialogError> {
        let api = self.api.as_ref();
        let mut state = self.state();

        let interrupted = Arc::clone(&state.current).handle_interrupt(api);
        let interrupting = interaction.act(api);

        let snapshot = interrupted.as_ref().ok().and_then(Option::as_ref);
        let settled = match (interrupting.as_ref().ok().and_then(Option::as_ref), snapshot) {
            (Some(current), Some(interrupted)) => Ok(Some(Arc::new(InterruptContext::new(
                Arc::clone(interrupted),
                Arc::clone(current),
            )) as Arc<dyn DialogContext>)),
            (Some(current), None) => Ok(Some(Arc::clone(current))),
            (None, Some(interrupted)) => Arc::clone(interrupted).handle_restore(api),
            (None, None) => Ok(None),
        };

        let restore_error = match settled {
            Ok(next) => {
                self.install(&mut state, next);
                None
            }
            Err(e) => Some(e),
        };
        drop(state);

        interrupting?;
        interrupted?;
        restore_error.map_or(Ok(()), Err)
    }

    /// Advance the countdown by `delta`, firing the current context's
    /// timeout once it runs out.
    ///
    /// # Errors
    ///
    /// Returns the error of `handle_timeout`; the context stays and its
    /// countdown restarts.
    pub fn tick_timeout(&self, delta: Duration) -> Result<(), DialogError> {
        let mut state = self.state();
        state.remaining -= delta.as_secs_f64();
        if state.remaining > 0.0 {
            return Ok(());
        }

        tracing::debug!(context = ?state.current, "Dialog timed out");
        match Arc::clone(&state.current).handle_timeout(self.api.as_ref()) {
            Ok(next) => {
                self.install(&mut state, next);
                Ok(())
            }
            Err(e) => {
                self.restart_countdown(&mut state);
                Err(e)
            }
        }
    }

    pub fn current_context(&self) -> Arc<dyn DialogContext> {
        Arc::clone(&self.state().current)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

//! Property-based tests for the conversation state machine
//!
//! Countdown and interrupt bookkeeping must hold for any sequence of
//! ticks, commands and interactions.

use super::*;
use crate::context::Handled;
use crate::interaction::{construct_active_interaction, InteractionSource};
use crate::testing::{message, ContextMock, StubApi};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn as_dyn(ctx: &Arc<ContextMock>) -> Arc<dyn DialogContext> {
    Arc::clone(ctx) as Arc<dyn DialogContext>
}

/// Machine whose default context hands "старт" over to `target`
fn machine_with(target: &Arc<ContextMock>) -> (ConversationStateMachine, Arc<ContextMock>) {
    let default_ctx = ContextMock::builder().on_command("старт", as_dyn(target)).build();
    let machine = ConversationStateMachine::new(
        Arc::new(StubApi::new()),
        as_dyn(&default_ctx),
        Duration::from_secs(10),
    );
    (machine, default_ctx)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Tick lengths in half seconds, exact in binary floating point
fn arb_ticks() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=6, 1..40)
}

fn arb_command() -> impl Strategy<Value = String> {
    "[а-я]{1,8}( [а-я]{1,8}){0,2}"
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn timeout_fires_once_the_countdown_runs_out(timeout_secs in 1u32..=30, ticks in arb_ticks()) {
        let target = ContextMock::builder()
            .staying()
            .with_timeout(Duration::from_secs(timeout_secs.into()))
            .build();
        let (machine, _default) = machine_with(&target);
        machine.process_command(&message("старт")).unwrap();

        let budget = timeout_secs * 2;
        let mut elapsed = 0;
        for tick in ticks {
            let before = elapsed;
            elapsed += tick;
            machine.tick_timeout(Duration::from_millis(u64::from(tick) * 500)).unwrap();

            if before >= budget {
                break;
            }
            let expected = usize::from(elapsed >= budget);
            prop_assert_eq!(target.timeouts(), expected);
            if expected == 1 {
                prop_assert!(!Arc::ptr_eq(&machine.current_context(), &as_dyn(&target)));
            }
        }
    }

    #[test]
    fn ended_dialogs_fall_back_to_default(commands in prop::collection::vec(arb_command(), 1..20)) {
        let default_ctx = ContextMock::new();
        let machine = ConversationStateMachine::new(
            Arc::new(StubApi::new()),
            as_dyn(&default_ctx),
            Duration::from_secs(10),
        );

        for text in &commands {
            machine.process_command(&message(text)).unwrap();
            prop_assert!(Arc::ptr_eq(&machine.current_context(), &as_dyn(&default_ctx)));
        }
        prop_assert_eq!(default_ctx.commands(), commands);
    }

    #[test]
    fn short_interactions_restore_the_interrupted_dialog(acts in 1usize..10) {
        let target = ContextMock::builder().staying().build();
        let (machine, _default) = machine_with(&target);
        machine.process_command(&message("старт")).unwrap();

        for _ in 0..acts {
            let interaction = construct_active_interaction(
                InteractionSource::function(|_| Ok(Handled::Done)),
                None,
            );
            machine.process_active_interaction(interaction.as_ref()).unwrap();
            prop_assert!(Arc::ptr_eq(&machine.current_context(), &as_dyn(&target)));
        }
        prop_assert_eq!(target.interrupts(), acts);
        prop_assert_eq!(target.restores(), acts);
    }
}

//! Assistant brain
//!
//! Assembles the root dialog context from the skills' command maps and the
//! configuration, and owns everything one conversation needs at runtime:
//! the state machine, the output pool and the timeout ticker.

use crate::api::AssistantApi;
use crate::command_tree::CommandTree;
use crate::config::BrainConfig;
use crate::context::{
    construct_context, AliasResolutionContext, CommandAliases, CommandErrorInterceptionContext,
    CommandMap, CommandTreeContext, ContextSource, DialogContext, Handler, TreeDefinition,
    TriggerPhraseContext,
};
use crate::error::DialogError;
use crate::interaction::{construct_active_interaction, InteractionSource};
use crate::message::InboundMessage;
use crate::output::{CompositeOutputPool, OutputPool};
use crate::state_machine::ConversationStateMachine;
use crate::ticker::{TimeoutClock, TimeoutTicker};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use uuid::Uuid;

/// API handed to the contexts of a [`Brain`]
struct BrainApi {
    machine: Weak<ConversationStateMachine>,
    outputs: Arc<CompositeOutputPool>,
}

impl AssistantApi for BrainApi {
    fn outputs(&self) -> Arc<dyn OutputPool> {
        Arc::clone(&self.outputs) as Arc<dyn OutputPool>
    }

    fn submit_active_interaction(
        &self,
        interaction: InteractionSource,
        related_message: Option<InboundMessage>,
    ) -> Result<(), DialogError> {
        let machine = self
            .machine
            .upgrade()
            .ok_or_else(|| DialogError::usage("brain is gone"))?;
        let interaction = construct_active_interaction(interaction, related_message);
        machine.process_active_interaction(interaction.as_ref())
    }
}

pub struct Brain {
    id: Uuid,
    machine: Arc<ConversationStateMachine>,
    outputs: Arc<CompositeOutputPool>,
    ticker: Mutex<Option<TimeoutTicker>>,
}

impl Brain {
    /// Build the root context and start the conversation.
    ///
    /// Skills whose commands conflict with an earlier skill are skipped
    /// after logging; commands registered before the conflict stay. Unless
    /// timeouts are disabled this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails on invalid timeout settings, on a root context that cannot be
    /// built, and when the ticker needs a runtime that is not there.
    pub fn start(
        config: &BrainConfig,
        skills: Vec<CommandMap>,
        predefined_outputs: Vec<Arc<dyn OutputPool>>,
    ) -> Result<Self, DialogError> {
        let id = Uuid::new_v4();
        let default_timeout = config.default_timeout()?;
        let root = build_root(config, skills)?;
        let outputs = Arc::new(CompositeOutputPool::new(predefined_outputs));

        let machine = Arc::new_cyclic(|machine: &Weak<ConversationStateMachine>| {
            let api = Arc::new(BrainApi {
                machine: machine.clone(),
                outputs: Arc::clone(&outputs),
            });
            ConversationStateMachine::new(api, root, default_timeout)
        });

        let ticker = if config.timeouts_disabled {
            None
        } else {
            let clock = Arc::clone(&machine) as Arc<dyn TimeoutClock>;
            Some(TimeoutTicker::spawn(clock, config.timeout_check_interval()?)?)
        };

        tracing::info!(
            brain_id = %id,
            timeouts = ticker.is_some(),
            "Brain started"
        );

        Ok(Self {
            id,
            machine,
            outputs,
            ticker: Mutex::new(ticker),
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle one user utterance, preferring `outputs` for the replies.
    ///
    /// # Errors
    ///
    /// Returns the error of the context that failed the command. The
    /// current context is already settled by then.
    pub fn process_text(&self, text: &str, outputs: &Arc<dyn OutputPool>) -> Result<(), DialogError> {
        self.outputs.push_front(Arc::clone(outputs));
        let message = InboundMessage::plain(text, Arc::clone(outputs));
        tracing::debug!(brain_id = %self.id, text = %message.text(), "Processing command");

        let result = self.machine.process_command(&message);
        self.outputs.remove(outputs);
        result
    }

    /// Start an assistant-initiated interaction.
    ///
    /// Must not be called from a handler of this brain's own dialog.
    pub fn submit_active_interaction(
        &self,
        interaction: InteractionSource,
        related_message: Option<InboundMessage>,
    ) -> Result<(), DialogError> {
        let interaction = construct_active_interaction(interaction, related_message);
        self.machine.process_active_interaction(interaction.as_ref())
    }

    /// Stop the timeout ticker and wait for it.
    pub async fn kill(&self) {
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            ticker.terminate();
            ticker.join().await;
        }
        tracing::info!(brain_id = %self.id, "Brain stopped");
    }
}

fn build_root(
    config: &BrainConfig,
    skills: Vec<CommandMap>,
) -> Result<Arc<dyn DialogContext>, DialogError> {
    let mut tree = CommandTree::new();
    let mut unknown: ContextSource = Handler::reply(config.unknown_root_command_reply.clone()).into();
    let mut ambiguous: ContextSource =
        Handler::reply(config.ambiguous_root_command_reply.clone()).into();

    for (index, skill) in skills.into_iter().enumerate() {
        let definition = TreeDefinition::from_map(skill);
        if let Err(e) = TreeDefinition::insert_into(definition.entries, &mut tree, None) {
            tracing::error!(skill = index, error = %e, "Skipping skill with conflicting commands");
            continue;
        }
        if let Some(source) = definition.unknown {
            unknown = source;
        }
        if let Some(source) = definition.ambiguous {
            ambiguous = source;
        }
    }

    let mut root: Arc<dyn DialogContext> = Arc::new(CommandTreeContext::new(
        tree,
        Some(construct_context(unknown, None)?),
        Some(construct_context(ambiguous, None)?),
    ));

    let aliases = CommandAliases::from_config(&config.command_aliases);
    if !aliases.is_empty() {
        root = Arc::new(AliasResolutionContext::new(root, Arc::new(aliases)));
    }

    if !config.error_phrases.is_empty() {
        root = Arc::new(CommandErrorInterceptionContext::new(
            root,
            config.error_phrases.clone(),
        )?);
    }

    let triggers = config.trigger_phrase_words();
    if !triggers.is_empty() {
        root = Arc::new(TriggerPhraseContext::new(triggers, root));
    }

    Ok(root)
}

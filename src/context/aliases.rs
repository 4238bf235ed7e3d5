//! User-defined command aliases
//!
//! An alias maps extra phrases onto a command registered by some skill.
//! Aliases are resolved before the command reaches the skill tree, and
//! may chain: an alias may point at another alias.

use super::wrapper::rewrap;
use super::{DialogContext, Next};
use crate::api::AssistantApi;
use crate::command_tree::{CommandEntry, CommandTree, CommandTreeError};
use crate::error::DialogError;
use crate::message::InboundMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One or several alias phrases. Each phrase may hold `|`-separated variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasList {
    One(String),
    Many(Vec<String>),
}

impl AliasList {
    fn phrases(&self) -> &[String] {
        match self {
            Self::One(phrase) => std::slice::from_ref(phrase),
            Self::Many(phrases) => phrases,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasConfig {
    /// Command the aliases stand for
    pub command: String,
    pub aliases: AliasList,
    /// Do not resolve `command` itself as an alias
    #[serde(default, alias = "forbid_recursion")]
    pub forbid_recursion: bool,
}

struct Alias {
    command: String,
    forbid_recursion: bool,
}

impl Alias {
    fn apply(&self, message: &InboundMessage, rest: &str) -> InboundMessage {
        let full_text = format!("{} {rest}", self.command);
        let full_text = full_text.trim();
        tracing::debug!(from = %message.text(), to = %full_text, "Applying command alias");
        InboundMessage::partial(message, full_text)
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.forbid_recursion {
            write!(f, "non-recursive alias for {:?}", self.command)
        } else {
            write!(f, "alias for {:?}", self.command)
        }
    }
}

/// Compiled alias table
#[derive(Debug, Default)]
pub struct CommandAliases {
    tree: CommandTree<Arc<Alias>>,
    len: usize,
}

impl CommandAliases {
    /// Build the table. Entries whose phrases clash with earlier entries
    /// are logged and skipped; phrases inserted before the clash remain.
    pub fn from_config(configs: &[AliasConfig]) -> Self {
        let mut aliases = Self::default();
        for config in configs {
            let alias = Arc::new(Alias {
                command: config.command.clone(),
                forbid_recursion: config.forbid_recursion,
            });
            let entries = config
                .aliases
                .phrases()
                .iter()
                .map(|phrase| (phrase.clone(), CommandEntry::Leaf(Arc::clone(&alias))));

            match aliases
                .tree
                .add_commands(entries, Ok::<_, CommandTreeError>)
            {
                Ok(()) => aliases.len += 1,
                Err(e) => tracing::warn!(error = %e, command = %config.command, "Skipping command alias"),
            }
        }
        aliases
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rewrite `message` until no alias matches, a cycle is found, or a
    /// non-recursive alias has been applied.
    pub fn apply(&self, message: &InboundMessage) -> InboundMessage {
        let mut message = message.clone();
        let mut applied: Vec<Arc<Alias>> = Vec::new();

        loop {
            let (alias, rest) = match self.tree.get_command(message.text()) {
                Ok((alias, rest)) => (Arc::clone(alias), rest),
                Err(CommandTreeError::Ambiguous { .. } | CommandTreeError::Conflict { .. }) => {
                    tracing::warn!(text = %message.text(), "Ambiguous command alias");
                    return message;
                }
                Err(CommandTreeError::NoMatch { .. }) => return message,
            };

            if applied.iter().any(|seen| Arc::ptr_eq(seen, &alias)) {
                tracing::warn!(text = %message.text(), "Command aliases form a cycle, stopping");
                return message;
            }

            message = alias.apply(&message, &rest);
            if alias.forbid_recursion {
                return message;
            }
            applied.push(alias);
        }
    }
}

/// Resolves aliases before passing commands to the wrapped context
#[derive(Debug)]
pub struct AliasResolutionContext {
    inner: Arc<dyn DialogContext>,
    aliases: Arc<CommandAliases>,
}

impl AliasResolutionContext {
    pub fn new(inner: Arc<dyn DialogContext>, aliases: Arc<CommandAliases>) -> Self {
        Self { inner, aliases }
    }
}

impl DialogContext for AliasResolutionContext {
    fn handle_command(
        self: Arc<Self>,
        api: &dyn AssistantApi,
        message: &InboundMessage,
    ) -> Result<Next, DialogError> {
        let resolved = self.aliases.apply(message);
        let next = Arc::clone(&self.inner).handle_command(api, &resolved)?;
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

    fn timeout(&self, default: Duration) -> Duration {
        self.inner.timeout(default)
    }
}

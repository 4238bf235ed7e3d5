//! Building contexts from definitions
//!
//! Skills describe their commands as [`ContextSource`] values: ready
//! contexts, handler functions, nested command maps, or declarative JSON.
//! [`construct_context`] turns any of them into a [`DialogContext`].

use super::{
    CommandTreeContext, DialogContext, FunctionContext, FunctionContextWithArgs, Handler,
    HandlerWithArg,
};
use crate::api::ApiExtProvider;
use crate::command_tree::{CommandEntry, CommandTree};
use crate::error::DialogError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Key of a command map entry handling unrecognized commands
pub const UNKNOWN_COMMAND_KEY: &str = "[unknown]";
/// Key of a command map entry handling ambiguous commands
pub const AMBIGUOUS_COMMAND_KEY: &str = "[ambiguous]";

/// Anything a dialog context can be built from
pub enum ContextSource {
    Context(Arc<dyn DialogContext>),
    Handler(Handler),
    HandlerWithArg(HandlerWithArg),
    Commands(CommandMap),
    /// JSON definition: an object is a command map, a string a canned reply
    Declared(Value),
}

impl fmt::Debug for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context(ctx) => f.debug_tuple("Context").field(ctx).finish(),
            Self::Handler(handler) => f.debug_tuple("Handler").field(handler).finish(),
            Self::HandlerWithArg(handler) => f.debug_tuple("HandlerWithArg").field(handler).finish(),
            Self::Commands(map) => f.debug_tuple("Commands").field(map).finish(),
            Self::Declared(value) => f.debug_tuple("Declared").field(value).finish(),
        }
    }
}

impl From<Arc<dyn DialogContext>> for ContextSource {
    fn from(context: Arc<dyn DialogContext>) -> Self {
        Self::Context(context)
    }
}

impl From<Handler> for ContextSource {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<HandlerWithArg> for ContextSource {
    fn from(handler: HandlerWithArg) -> Self {
        Self::HandlerWithArg(handler)
    }
}

impl From<CommandMap> for ContextSource {
    fn from(map: CommandMap) -> Self {
        Self::Commands(map)
    }
}

impl From<Value> for ContextSource {
    fn from(value: Value) -> Self {
        Self::Declared(value)
    }
}

/// Command phrases mapped to the contexts handling them.
///
/// Keys may hold `|`-separated alternatives. A nested map extends the
/// phrase of its key; its own fallbacks are ignored, only the outermost map
/// decides what happens to unknown and ambiguous commands.
#[derive(Debug, Default)]
pub struct CommandMap {
    entries: Vec<(String, ContextSource)>,
    unknown: Option<Box<ContextSource>>,
    ambiguous: Option<Box<ContextSource>>,
}

impl CommandMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, source: impl Into<ContextSource>) -> Self {
        self.entries.push((key.into(), source.into()));
        self
    }

    #[must_use]
    pub fn on_unknown(mut self, source: impl Into<ContextSource>) -> Self {
        self.unknown = Some(Box::new(source.into()));
        self
    }

    #[must_use]
    pub fn on_ambiguous(mut self, source: impl Into<ContextSource>) -> Self {
        self.ambiguous = Some(Box::new(source.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unknown.is_none() && self.ambiguous.is_none()
    }

    /// Read a JSON object, honoring the reserved fallback keys.
    fn from_declared(object: serde_json::Map<String, Value>) -> Self {
        object
            .into_iter()
            .fold(Self::new(), |map, (key, value)| match key.as_str() {
                UNKNOWN_COMMAND_KEY => map.on_unknown(value),
                AMBIGUOUS_COMMAND_KEY => map.on_ambiguous(value),
                _ => map.with(key, value),
            })
    }
}

/// A command map split into tree entries and fallbacks
pub(crate) struct TreeDefinition {
    pub(crate) entries: Vec<(String, CommandEntry<ContextSource>)>,
    pub(crate) unknown: Option<ContextSource>,
    pub(crate) ambiguous: Option<ContextSource>,
}

impl TreeDefinition {
    pub(crate) fn from_map(map: CommandMap) -> Self {
        Self {
            entries: flatten(map.entries),
            unknown: map.unknown.map(|source| *source),
            ambiguous: map.ambiguous.map(|source| *source),
        }
    }

    /// Construct every leaf and insert the entries into `tree`.
    pub(crate) fn insert_into(
        entries: Vec<(String, CommandEntry<ContextSource>)>,
        tree: &mut CommandTree<Arc<dyn DialogContext>>,
        ext: Option<&ApiExtProvider>,
    ) -> Result<(), DialogError> {
        tree.add_commands(entries, |source| construct_context(source, ext))
    }
}

fn flatten(entries: Vec<(String, ContextSource)>) -> Vec<(String, CommandEntry<ContextSource>)> {
    entries
        .into_iter()
        .map(|(key, source)| {
            let entry = match source {
                ContextSource::Commands(nested) => nested_group(&key, nested),
                ContextSource::Declared(Value::Object(object)) => {
                    nested_group(&key, CommandMap::from_declared(object))
                }
                leaf => CommandEntry::Leaf(leaf),
            };
            (key, entry)
        })
        .collect()
}

fn nested_group(key: &str, map: CommandMap) -> CommandEntry<ContextSource> {
    if map.unknown.is_some() || map.ambiguous.is_some() {
        tracing::warn!(key = %key, "Fallbacks of a nested command map are ignored");
    }
    CommandEntry::Group(flatten(map.entries))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a dialog context from `source`.
///
/// `ext` is the provider of the handler that requested the context, if
/// any; handler contexts built here share it, together with any pending
/// timeout override.
pub fn construct_context(
    source: ContextSource,
    ext: Option<&ApiExtProvider>,
) -> Result<Arc<dyn DialogContext>, DialogError> {
    match source {
        ContextSource::Context(context) => Ok(context),
        ContextSource::Handler(handler) => Ok(Arc::new(FunctionContext::new(handler, ext.cloned()))),
        ContextSource::HandlerWithArg(handler) => {
            Ok(Arc::new(FunctionContextWithArgs::new(handler, ext.cloned())))
        }
        ContextSource::Commands(map) => {
            let definition = TreeDefinition::from_map(map);
            let mut tree = CommandTree::new();
            TreeDefinition::insert_into(definition.entries, &mut tree, ext)?;

            let unknown = definition
                .unknown
                .map(|source| construct_context(source, ext))
                .transpose()?;
            let ambiguous = definition
                .ambiguous
                .map(|source| construct_context(source, ext))
                .transpose()?;
            Ok(Arc::new(CommandTreeContext::new(tree, unknown, ambiguous)))
        }
        ContextSource::Declared(Value::Object(object)) => {
            construct_context(CommandMap::from_declared(object).into(), ext)
        }
        ContextSource::Declared(Value::String(reply)) => {
            construct_context(Handler::reply(reply).into(), ext)
        }
        ContextSource::Declared(other) => Err(DialogError::UnsupportedSource {
            kind: json_kind(&other),
            value: other.to_string(),
        }),
    }
}

//! Fuzzy command trie
//!
//! Maps space-separated phrases onto payloads (usually dialog contexts).
//! Lookups tolerate a couple of unexpected words at a fixed cost and report
//! near-ties as ambiguity instead of guessing.

#[cfg(test)]
mod proptests;

use std::collections::HashMap;
use std::fmt::{self, Debug};
use thiserror::Error;

/// Budget every lookup starts with
pub const INITIAL_TOLERANCE: f64 = 2.0;
/// Cost of skipping one input word that matches no edge
pub const SKIP_PENALTY: f64 = 1.0;
/// Candidates closer than this to the best one make the lookup ambiguous
pub const AMBIGUITY_THRESHOLD: f64 = 0.1;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Error)]
pub enum CommandTreeError {
    #[error("several commands registered for \"{path}\":\n\t- {existing}\n\t- {incoming}")]
    Conflict {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("no command matches \"{text}\"")]
    NoMatch { text: String },

    #[error("command \"{text}\" is ambiguous, candidates:{}", format_candidates(.candidates))]
    Ambiguous {
        text: String,
        candidates: Vec<String>,
    },
}

fn format_candidates(candidates: &[String]) -> String {
    candidates.iter().map(|c| format!("\n\t- {c}")).collect()
}

/// One level of a command definition.
///
/// Keys may list alternatives separated by `|`, and each alternative may
/// span several words: `"выключи|отключи"` or `"останови коня"`.
#[derive(Debug, Clone)]
pub enum CommandEntry<S> {
    Leaf(S),
    Group(Vec<(String, CommandEntry<S>)>),
}

impl<S> CommandEntry<S> {
    pub fn group<K: Into<String>>(entries: impl IntoIterator<Item = (K, CommandEntry<S>)>) -> Self {
        Self::Group(
            entries
                .into_iter()
                .map(|(key, entry)| (key.into(), entry))
                .collect(),
        )
    }
}

struct Node<T> {
    payload: Option<T>,
    children: HashMap<String, NodeId>,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            payload: None,
            children: HashMap::new(),
        }
    }
}

/// Arena-backed trie of command phrases.
///
/// Built once with [`CommandTree::add_commands`], then only read, so a
/// shared reference can serve concurrent lookups.
pub struct CommandTree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for CommandTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for CommandTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

struct Candidate<'a, T> {
    payload: &'a T,
    remainder: String,
    weight: f64,
}

impl<T> Candidate<'_, T> {
    fn is_close_to(&self, other: &Self) -> bool {
        (self.weight - other.weight).abs() < AMBIGUITY_THRESHOLD
    }
}

impl<T: Debug> fmt::Display for Candidate<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}) * {}", self.payload, self.remainder, self.weight)
    }
}

impl<T> CommandTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
        }
    }

    /// Insert a nested command definition.
    ///
    /// Leaves are passed through `construct` as they are reached, once
    /// each, and the result is cloned into every alias path. Registering a
    /// second payload on a path fails with [`CommandTreeError::Conflict`].
    /// On any error, whether a conflict or a failed `construct`, the paths
    /// inserted before it stay in the tree.
    pub fn add_commands<K, S, E>(
        &mut self,
        commands: impl IntoIterator<Item = (K, CommandEntry<S>)>,
        mut construct: impl FnMut(S) -> Result<T, E>,
    ) -> Result<(), E>
    where
        K: Into<String>,
        T: Clone + Debug,
        E: From<CommandTreeError>,
    {
        let root = [(ROOT, Vec::new())];
        for (key, entry) in commands {
            let key: String = key.into();
            self.insert_entry(&root, &key, entry, &mut construct)?;
        }
        Ok(())
    }

    /// Insert `entry` under `key` below every node of `parents`, each given
    /// with its path from the root.
    fn insert_entry<S, E, F>(
        &mut self,
        parents: &[(NodeId, Vec<String>)],
        key: &str,
        entry: CommandEntry<S>,
        construct: &mut F,
    ) -> Result<(), E>
    where
        T: Clone + Debug,
        E: From<CommandTreeError>,
        F: FnMut(S) -> Result<T, E>,
    {
        let (payload, children) = match entry {
            CommandEntry::Leaf(source) => (Some(construct(source)?), Vec::new()),
            CommandEntry::Group(children) => (None, children),
        };

        let mut reached = Vec::new();
        for (parent, path) in parents {
            for variant in key.split('|') {
                let node = self.descend_or_create(*parent, variant);
                let mut path = path.clone();
                path.push(variant.to_string());
                if let Some(payload) = &payload {
                    self.set_payload(node, payload.clone(), &path)?;
                }
                reached.push((node, path));
            }
        }

        for (child_key, child) in children {
            self.insert_entry(&reached, &child_key, child, &mut *construct)?;
        }
        Ok(())
    }

    fn descend_or_create(&mut self, from: NodeId, phrase: &str) -> NodeId {
        let mut node = from;
        for word in phrase.split(' ') {
            node = if let Some(&child) = self.nodes[node].children.get(word) {
                child
            } else {
                let child = self.nodes.len();
                self.nodes.push(Node::empty());
                self.nodes[node].children.insert(word.to_string(), child);
                child
            };
        }
        node
    }

    fn set_payload(&mut self, node: NodeId, payload: T, path: &[String]) -> Result<(), CommandTreeError>
    where
        T: Debug,
    {
        if let Some(existing) = &self.nodes[node].payload {
            return Err(CommandTreeError::Conflict {
                path: path.join(" "),
                existing: format!("{existing:?}"),
                incoming: format!("{payload:?}"),
            });
        }
        self.nodes[node].payload = Some(payload);
        Ok(())
    }

    /// Find the best command for `text`.
    ///
    /// Returns the payload and the part of the input the matched path did
    /// not consume. `text` is split on single spaces, so it is expected to be
    /// canonical already.
    ///
    /// # Errors
    ///
    /// [`CommandTreeError::NoMatch`] when nothing fits, and
    /// [`CommandTreeError::Ambiguous`] when several paths fit about as well.
    pub fn get_command(&self, text: &str) -> Result<(&T, String), CommandTreeError>
    where
        T: Debug,
    {
        let words: Vec<&str> = text.split(' ').collect();
        let mut candidates = Vec::new();
        self.collect_matches(ROOT, &words, INITIAL_TOLERANCE, false, &mut candidates);

        // Stable, so equal weights keep traversal order.
        candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let Some(best) = candidates.first() else {
            return Err(CommandTreeError::NoMatch {
                text: text.to_string(),
            });
        };

        if candidates.get(1).is_some_and(|second| best.is_close_to(second)) {
            return Err(CommandTreeError::Ambiguous {
                text: text.to_string(),
                candidates: candidates
                    .iter()
                    .filter(|candidate| best.is_close_to(candidate))
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        let best = candidates.swap_remove(0);
        Ok((best.payload, best.remainder))
    }

    #[allow(clippy::cast_precision_loss)]
    fn collect_matches<'a>(
        &'a self,
        node: NodeId,
        words: &[&str],
        tolerance: f64,
        skipped_here: bool,
        out: &mut Vec<Candidate<'a, T>>,
    ) {
        if tolerance < 0.0 {
            return;
        }

        let current = &self.nodes[node];
        let payload = current.payload.as_ref().filter(|_| !skipped_here);

        let Some((word, rest)) = words.split_first() else {
            if let Some(payload) = payload {
                out.push(Candidate {
                    payload,
                    remainder: String::new(),
                    weight: tolerance,
                });
            }
            return;
        };

        // Accepting here leaves the remaining words as the command argument.
        if let Some(payload) = payload {
            out.push(Candidate {
                payload,
                remainder: words.join(" "),
                weight: tolerance - words.len() as f64,
            });
        }

        if let Some(&child) = current.children.get(*word) {
            self.collect_matches(child, rest, tolerance, false, out);
        }

        self.collect_matches(node, rest, tolerance - SKIP_PENALTY, true, out);
    }
}

//! Output channels
//!
//! Replies leave the dialog core through channels supplied by transports
//! (console, chat bots, speakers). Pools group channels so that outputs
//! related to the message being handled can be preferred over generic ones.

use crate::error::DialogError;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Text,
    Speech,
    Audio,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Speech => "speech",
            Self::Audio => "audio",
        })
    }
}

pub trait TextOutput: Send + Sync {
    fn send(&self, text: &str) -> Result<(), DialogError>;
}

pub trait AudioOutput: Send + Sync {
    fn send_file(&self, path: &Path) -> Result<(), DialogError>;
}

/// A single output destination.
///
/// Speech channels accept text too, so they also answer text lookups.
#[derive(Clone)]
pub enum OutputChannel {
    Text(Arc<dyn TextOutput>),
    Speech(Arc<dyn TextOutput>),
    Audio(Arc<dyn AudioOutput>),
}

impl OutputChannel {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Text(_) => ChannelKind::Text,
            Self::Speech(_) => ChannelKind::Speech,
            Self::Audio(_) => ChannelKind::Audio,
        }
    }
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputChannel({})", self.kind())
    }
}

pub trait OutputPool: Send + Sync {
    /// All channels in order of preference
    fn channels(&self) -> Vec<OutputChannel>;

    fn text(&self) -> Result<Arc<dyn TextOutput>, DialogError> {
        self.channels()
            .into_iter()
            .find_map(|channel| match channel {
                OutputChannel::Text(out) | OutputChannel::Speech(out) => Some(out),
                OutputChannel::Audio(_) => None,
            })
            .ok_or(DialogError::OutputNotFound(ChannelKind::Text))
    }

    fn speech(&self) -> Result<Arc<dyn TextOutput>, DialogError> {
        self.channels()
            .into_iter()
            .find_map(|channel| match channel {
                OutputChannel::Speech(out) => Some(out),
                _ => None,
            })
            .ok_or(DialogError::OutputNotFound(ChannelKind::Speech))
    }

    fn audio(&self) -> Result<Arc<dyn AudioOutput>, DialogError> {
        self.channels()
            .into_iter()
            .find_map(|channel| match channel {
                OutputChannel::Audio(out) => Some(out),
                _ => None,
            })
            .ok_or(DialogError::OutputNotFound(ChannelKind::Audio))
    }
}

/// Try `preferred` first, fall back to `general` when it lacks a channel.
pub fn prefer<T>(
    preferred: &dyn OutputPool,
    general: &dyn OutputPool,
    pick: impl Fn(&dyn OutputPool) -> Result<T, DialogError>,
) -> Result<T, DialogError> {
    match pick(preferred) {
        Err(DialogError::OutputNotFound(_)) => pick(general),
        found => found,
    }
}

/// Fixed set of channels
pub struct StaticOutputPool {
    channels: Vec<OutputChannel>,
}

impl StaticOutputPool {
    pub fn new(channels: Vec<OutputChannel>) -> Self {
        Self { channels }
    }
}

impl OutputPool for StaticOutputPool {
    fn channels(&self) -> Vec<OutputChannel> {
        self.channels.clone()
    }
}

/// Ordered list of pools, earlier pools win.
#[derive(Default)]
pub struct CompositeOutputPool {
    pools: RwLock<Vec<Arc<dyn OutputPool>>>,
}

impl CompositeOutputPool {
    pub fn new(pools: Vec<Arc<dyn OutputPool>>) -> Self {
        Self {
            pools: RwLock::new(pools),
        }
    }

    pub fn push_front(&self, pool: Arc<dyn OutputPool>) {
        self.pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, pool);
    }

    /// Remove the first occurrence of `pool`
    pub fn remove(&self, pool: &Arc<dyn OutputPool>) {
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = pools.iter().position(|p| Arc::ptr_eq(p, pool)) {
            pools.remove(index);
        }
    }
}

impl OutputPool for CompositeOutputPool {
    fn channels(&self) -> Vec<OutputChannel> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|pool| pool.channels())
            .collect()
    }
}

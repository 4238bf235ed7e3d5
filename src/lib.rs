//! Dialog management core of a voice assistant
//!
//! Routes recognized utterances through a tree of dialog contexts, keeps
//! track of reply timeouts, and lets the assistant interrupt a dialog with
//! interactions of its own.

pub mod api;
pub mod brain;
pub mod command_tree;
pub mod config;
pub mod context;
pub mod error;
pub mod interaction;
pub mod message;
pub mod output;
pub mod state_machine;
pub mod ticker;

#[cfg(test)]
mod testing;

pub use brain::Brain;
pub use config::BrainConfig;
pub use error::DialogError;

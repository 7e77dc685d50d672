//! Terminal client for chat backends that stream newline-delimited JSON.
//!
//! The heart of the crate is [`reconciler::Reconciler`], which turns the
//! ever-growing text of a streamed response into a deduplicated
//! [`reconciler::Conversation`] keyed by message timestamp.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod prefs;
pub mod reconciler;
pub mod render;
pub mod view;

pub use error::{ChatError, Result};
pub use message::{ChatMessage, ParsedLine, Role};
pub use reconciler::{Conversation, MessageNode, ReconcileReport, Reconciler};

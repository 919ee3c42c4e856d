//! Wildchat is a terminal chat client for OpenAI-compatible streaming APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversation state, configuration, personality presets,
//!   transcript persistence, and the streaming-worker lifecycle.
//! - [`ui`] runs the interactive chat loop that drives user input, relays
//!   streamed fragments, and handles cancellation.
//! - [`api`] defines the chat-completions wire payloads.
//! - [`cli`] parses arguments and dispatches into the chat loop or the
//!   one-shot commands.
//!
//! The streaming lifecycle is the heart of the crate: each user turn starts
//! exactly one background worker ([`core::chat_stream`]) that relays text
//! fragments over a bounded channel to the single consumer, which folds them
//! into conversation state ([`core::conversation`]). Completion, error, and
//! cancellation all converge on the same Idle state.

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;
pub mod utils;

//! Conversation primitives for bots: wait for the reply or button press that
//! answers a prompt instead of handling it in a detached handler.
//!
//! This crate is intentionally framework-agnostic. The transport (Telegram
//! today) lives behind `messaging::port::MessagingPort` and feeds updates in
//! through `listen::DispatchHook`.

pub mod ask;
pub mod config;
pub mod domain;
pub mod errors;
pub mod listen;
pub mod logging;
pub mod messaging;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

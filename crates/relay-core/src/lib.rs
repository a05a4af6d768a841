//! Core of the broadcast relay: recipient stores, the fan-out dispatch loop
//! and the reconciler that purges dead recipients.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! [`messaging::port::Transport`] port, implemented in the adapter crate.

pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod reconcile;
pub mod security;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};

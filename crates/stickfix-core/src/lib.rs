//! Core of the Stickfix bot: user registry, per-user conversation state and
//! command dispatch.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port
//! implemented in the adapter crate; persistence lives behind [`store::UserStore`].

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod session;
pub mod state;
pub mod store;

pub use errors::{Error, Result};

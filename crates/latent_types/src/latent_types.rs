//! Latent Types - Core type definitions for the latent task bridge
//!
//! This crate contains the pure data structures shared between the runtime
//! and the hosts that embed it: task identities and outcomes, the contexts
//! tasks are started against, engine events, and the typed call surface that
//! scripted graphs see.

mod context;
mod event;
mod task;
mod types;

pub use context::*;
pub use event::*;
pub use task::*;
pub use types::*;

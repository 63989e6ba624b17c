//! Latent Runtime - Async task bridge for scripted graphs
//!
//! This crate lets a scripted graph node start a deferred engine operation,
//! suspend at that node, and resume exactly once with the result on the
//! scripting tick, surviving cancellation and owner teardown.
//!
//! The pieces, leaf first:
//! - [`TaskHandle`]: identity and state of one in-flight operation
//! - [`TaskRegistry`]: session-scoped owner of live handles
//! - [`CompletionRouter`]: queues outcomes and delivers them at the tick boundary
//! - [`AsyncBridge`]: entry points that create, register and issue tasks
//! - [`TeardownMonitor`]: cancels tasks whose owning context is destroyed
//! - [`Session`]: the world object that owns all of the above

pub use latent_types;

mod bridge;
mod config;
mod context;
mod entry;
mod error;
mod handle;
pub mod platform;
mod registry;
mod router;
mod session;
mod teardown;

pub use bridge::*;
pub use config::*;
pub use context::*;
pub use entry::*;
pub use error::*;
pub use handle::*;
pub use registry::*;
pub use router::*;
pub use session::*;
pub use teardown::*;

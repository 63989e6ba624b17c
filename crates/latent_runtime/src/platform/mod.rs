//! Engine Platform
//!
//! The "start an async operation with a callback" capability the bridge
//! depends on. Implementations give no guarantee about which thread the
//! callback runs on, when it runs (possibly before `start` returns), or how
//! many times it runs.

mod manual;
mod tokio_platform;

pub use manual::{IssuedRequest, ManualPlatform};
pub use tokio_platform::TokioPlatform;

use std::sync::Arc;
use std::time::Duration;

use latent_types::{ContextId, TaskPayload, TaskToken};

/// Concrete engine request issued for one task
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformRequest {
    /// Fire after a delay
    Delay { duration: Duration },
    /// Stream in a single asset
    LoadAsset { path: String, priority: i32 },
    /// Load a whole package, optionally flushing before returning
    LoadPackage {
        path: String,
        priority: i32,
        block_on_load: bool,
    },
    /// Wait for the next engine event matching `pattern`
    WaitForEvent { owner: ContextId, pattern: String },
    /// Write a property on a live engine object
    SetPropertyValue {
        owner: ContextId,
        property: String,
        value: String,
    },
}

impl PlatformRequest {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformRequest::Delay { .. } => "delay",
            PlatformRequest::LoadAsset { .. } => "load_asset",
            PlatformRequest::LoadPackage { .. } => "load_package",
            PlatformRequest::WaitForEvent { .. } => "wait_for_event",
            PlatformRequest::SetPropertyValue { .. } => "set_property_value",
        }
    }
}

/// What the platform reports back: a payload, or a failure reason
pub type PlatformResult = Result<TaskPayload, String>;

/// Completion callback handed to the platform
///
/// `Fn` rather than `FnOnce`: a misbehaving platform may call it again, and
/// the bridge tolerates that.
pub type PlatformCallback = Arc<dyn Fn(PlatformResult) + Send + Sync>;

/// Host engine capability used by the bridge
pub trait EnginePlatform: Send + Sync {
    /// Start the request, eventually calling `on_done`
    fn start(&self, token: TaskToken, request: PlatformRequest, on_done: PlatformCallback);

    /// Hint that the task was cancelled and its work may stop
    ///
    /// A callback may still arrive afterwards.
    fn abandon(&self, _token: TaskToken) {}

    /// The context is gone; drop any engine-side state kept for it
    fn release_context(&self, _owner: ContextId) {}
}

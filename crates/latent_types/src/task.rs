// Task Types - Identity, state and outcome of one latent operation

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ContextId, EngineEvent, ResultPins};

// ─────────────────────────────────────────────────────────────────────────────
// Task Token
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identity of a task within a session
///
/// Tokens come from a monotonic counter and are never reused by the session
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskToken(u64);

impl TaskToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task State
// ─────────────────────────────────────────────────────────────────────────────

/// Current state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Waiting for the underlying operation
    Pending = 0,
    /// Finished with a result
    Completed = 1,
    /// Cancelled before finishing
    Cancelled = 2,
    /// Finished with a failure
    Failed = 3,
}

impl TaskState {
    /// Convert from u8
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Completed,
            2 => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Cancelled => write!(f, "cancelled"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Result of an asynchronous package load, as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncLoadingResult {
    Failed,
    Succeeded,
    Canceled,
}

/// Success value of a task, shaped by the operation that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Fire-and-forget operations
    Nothing,
    /// A timer elapsed
    Elapsed { waited: Duration },
    /// An asset finished loading
    Asset { path: String },
    /// A package load finished (possibly unsuccessfully at the engine level)
    Package {
        path: String,
        result: AsyncLoadingResult,
    },
    /// An awaited engine event arrived
    Event(EngineEvent),
    /// A boolean answer from the engine
    Flag { value: bool },
}

impl TaskPayload {
    /// Values to expose on the node's data output pins
    pub fn output_values(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut values = serde_json::Map::new();
        match self {
            TaskPayload::Nothing => {}
            TaskPayload::Elapsed { waited } => {
                values.insert("waited".into(), waited.as_secs_f64().into());
            }
            TaskPayload::Asset { path } => {
                values.insert("asset".into(), path.clone().into());
            }
            TaskPayload::Package { path, result } => {
                values.insert("package".into(), path.clone().into());
                values.insert(
                    "result".into(),
                    serde_json::to_value(result).unwrap_or_default(),
                );
            }
            TaskPayload::Event(event) => {
                values.insert(
                    "event".into(),
                    serde_json::to_value(event).unwrap_or_default(),
                );
            }
            TaskPayload::Flag { value } => {
                values.insert("success".into(), (*value).into());
            }
        }
        values
    }
}

/// Terminal outcome of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { payload: TaskPayload },
    Failed { reason: String },
    Cancelled,
}

impl TaskOutcome {
    /// The terminal state this outcome puts a task in
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Completed { .. } => TaskState::Completed,
            TaskOutcome::Failed { .. } => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resumption
// ─────────────────────────────────────────────────────────────────────────────

/// Where in the originating graph a task resumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Node instance that started the task
    pub node_id: String,
    /// Pins to fire per outcome
    #[serde(default)]
    pub pins: ResultPins,
}

impl ResumePoint {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            pins: ResultPins::default(),
        }
    }

    pub fn with_pins(node_id: impl Into<String>, pins: ResultPins) -> Self {
        Self {
            node_id: node_id.into(),
            pins,
        }
    }

    /// The exec pin that fires for the given outcome
    pub fn pin_for(&self, outcome: &TaskOutcome) -> &str {
        match outcome {
            TaskOutcome::Completed { .. } => &self.pins.success,
            TaskOutcome::Failed { .. } => &self.pins.failure,
            TaskOutcome::Cancelled => &self.pins.cancelled,
        }
    }
}

/// One delivery of a task outcome to the scripted graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resumption {
    pub token: TaskToken,
    pub owner: ContextId,
    pub resume: ResumePoint,
    pub outcome: TaskOutcome,
}

impl Resumption {
    /// The exec pin the graph should continue from
    pub fn exec_pin(&self) -> &str {
        self.resume.pin_for(&self.outcome)
    }

    /// Data output values for the resumed node
    pub fn output_values(&self) -> serde_json::Map<String, serde_json::Value> {
        match &self.outcome {
            TaskOutcome::Completed { payload } => payload.output_values(),
            TaskOutcome::Failed { reason } => {
                let mut values = serde_json::Map::new();
                values.insert("reason".into(), reason.clone().into());
                values
            }
            TaskOutcome::Cancelled => serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_u8() {
        for state in [
            TaskState::Pending,
            TaskState::Completed,
            TaskState::Cancelled,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_u8(state as u8), state);
        }
        assert!(!TaskState::Pending.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn test_resumption_pin_selection() {
        let resume = ResumePoint::new("load_1");
        let done = TaskOutcome::Completed {
            payload: TaskPayload::Asset {
                path: "/Game/Hero".into(),
            },
        };
        let failed = TaskOutcome::Failed {
            reason: "missing".into(),
        };

        assert_eq!(resume.pin_for(&done), "then");
        assert_eq!(resume.pin_for(&failed), "failed");
        assert_eq!(resume.pin_for(&TaskOutcome::Cancelled), "cancelled");
    }

    #[test]
    fn test_package_output_values() {
        let payload = TaskPayload::Package {
            path: "/Game/Maps/Arena".into(),
            result: AsyncLoadingResult::Canceled,
        };
        let values = payload.output_values();
        assert_eq!(values["package"], "/Game/Maps/Arena");
        assert_eq!(values["result"], "canceled");
    }

    #[test]
    fn test_token_display() {
        assert_eq!(TaskToken::new(7).to_string(), "task-7");
    }
}

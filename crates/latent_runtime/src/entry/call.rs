// Call Context - Arguments of one graph call into an entry point

use std::collections::HashMap;

use serde_json::Value;

use latent_types::{ContextId, ResumePoint};

use crate::error::{BridgeError, BridgeResult};

/// Inputs and identity of a single entry point invocation
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Node instance that made the call
    pub node_id: String,
    /// Implicit world/context argument
    pub owner: ContextId,
    /// Input values (pin_name -> value)
    pub inputs: HashMap<String, Value>,
    /// Where the graph resumes once the task settles
    pub resume: ResumePoint,
}

impl CallContext {
    /// Create a call context resuming at `node_id` with the default pins
    pub fn new(node_id: impl Into<String>, owner: ContextId, inputs: HashMap<String, Value>) -> Self {
        let node_id = node_id.into();
        Self {
            resume: ResumePoint::new(node_id.clone()),
            node_id,
            owner,
            inputs,
        }
    }

    /// Replace the resume point
    pub fn with_resume(mut self, resume: ResumePoint) -> Self {
        self.resume = resume;
        self
    }

    /// Get an input value by pin name
    pub fn get_input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).filter(|v| !v.is_null())
    }

    /// Required real input
    pub fn require_real(&self, name: &str) -> BridgeResult<f64> {
        match self.get_input(name) {
            Some(v) => v
                .as_f64()
                .ok_or_else(|| BridgeError::invalid(format!("{name} must be a number, got {v}"))),
            None => Err(missing(name)),
        }
    }

    /// Required string input
    pub fn require_string(&self, name: &str) -> BridgeResult<&str> {
        match self.get_input(name) {
            Some(v) => v
                .as_str()
                .ok_or_else(|| BridgeError::invalid(format!("{name} must be a string, got {v}"))),
            None => Err(missing(name)),
        }
    }

    /// Optional real input, rejecting values of the wrong type
    pub fn optional_real(&self, name: &str) -> BridgeResult<Option<f64>> {
        self.get_input(name).map(|_| self.require_real(name)).transpose()
    }

    /// Optional boolean input, rejecting values of the wrong type
    pub fn optional_bool(&self, name: &str) -> BridgeResult<Option<bool>> {
        match self.get_input(name) {
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| BridgeError::invalid(format!("{name} must be a boolean, got {v}"))),
            None => Ok(None),
        }
    }

    /// Optional 32-bit integer input
    pub fn optional_i32(&self, name: &str) -> BridgeResult<Option<i32>> {
        let Some(v) = self.get_input(name) else {
            return Ok(None);
        };
        let wide = v
            .as_i64()
            .ok_or_else(|| BridgeError::invalid(format!("{name} must be an integer, got {v}")))?;
        i32::try_from(wide)
            .map(Some)
            .map_err(|_| BridgeError::invalid(format!("{name} out of range: {wide}")))
    }
}

fn missing(name: &str) -> BridgeError {
    BridgeError::invalid(format!("missing required input: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(inputs: Value) -> CallContext {
        let inputs = match inputs {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        CallContext::new("node_1", ContextId::new(0, 0), inputs)
    }

    #[test]
    fn test_typed_inputs() {
        let ctx = call(json!({"duration": 1.5, "path": "/Game/Hero", "block": true}));

        assert_eq!(ctx.require_real("duration").unwrap(), 1.5);
        assert_eq!(ctx.require_string("path").unwrap(), "/Game/Hero");
        assert_eq!(ctx.optional_bool("block").unwrap(), Some(true));
        assert_eq!(ctx.optional_bool("absent").unwrap(), None);
        assert_eq!(ctx.resume.node_id, "node_1");
    }

    #[test]
    fn test_wrong_types_are_invalid() {
        let ctx = call(json!({"duration": "soon", "priority": 1u64 << 40}));

        assert!(matches!(
            ctx.require_real("duration"),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            ctx.require_real("missing"),
            Err(BridgeError::InvalidArgument(msg)) if msg.contains("missing")
        ));
        assert!(ctx.optional_i32("priority").is_err());
    }

    #[test]
    fn test_null_counts_as_absent() {
        let ctx = call(json!({"timeout": null}));
        assert_eq!(ctx.optional_real("timeout").unwrap(), None);
    }
}

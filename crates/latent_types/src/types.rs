// Entry Point Types - The call surface exposed to scripted graphs
//
// Every async operation appears to a graph as a named entry point with typed
// input pins and one or more exec result pins that fire exactly once.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Pin Types
// ─────────────────────────────────────────────────────────────────────────────

/// Direction of a pin on an entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    Input,
    Output,
}

/// Data types that can flow through pins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum PinType {
    /// Execution flow (no data, just control flow)
    Exec,
    /// Floating point
    Real,
    /// Signed integer
    Integer,
    /// Boolean value
    Boolean,
    /// String value
    String,
    /// An engine event delivered by an event wait
    Event,
    /// Reference to an engine asset or package
    Asset,
    /// Dynamic type (serde_json::Value) - accepts anything
    Any,
}

impl PinType {
    /// Check if this is an execution pin type
    pub fn is_exec(&self) -> bool {
        matches!(self, PinType::Exec)
    }

    /// Check if this is a data pin type
    pub fn is_data(&self) -> bool {
        !self.is_exec()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pin Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Definition of a pin on an entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinDef {
    /// Pin name (used as the input key or the result pin to fire)
    pub name: String,
    /// Pin direction (input or output)
    pub direction: PinDirection,
    /// Data type of the pin
    #[serde(rename = "type")]
    pub pin_type: PinType,
    /// Default value for input pins (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PinDef {
    /// Create an execution input pin
    pub fn exec_in() -> Self {
        Self {
            name: "exec".to_string(),
            direction: PinDirection::Input,
            pin_type: PinType::Exec,
            default: None,
            description: None,
        }
    }

    /// Create an execution output pin with a custom name
    pub fn exec_out(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PinDirection::Output,
            pin_type: PinType::Exec,
            default: None,
            description: None,
        }
    }

    /// Create a data input pin
    pub fn data_in(name: &str, pin_type: PinType) -> Self {
        Self {
            name: name.to_string(),
            direction: PinDirection::Input,
            pin_type,
            default: None,
            description: None,
        }
    }

    /// Create a data input pin with a default value
    pub fn data_in_with_default(
        name: &str,
        pin_type: PinType,
        default: serde_json::Value,
    ) -> Self {
        Self {
            default: Some(default),
            ..Self::data_in(name, pin_type)
        }
    }

    /// Create a data output pin
    pub fn data_out(name: &str, pin_type: PinType) -> Self {
        Self {
            name: name.to_string(),
            direction: PinDirection::Output,
            pin_type,
            default: None,
            description: None,
        }
    }

    /// Attach a description
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// How many requests of one operation may be outstanding per context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Every call produces an independent task
    #[default]
    Concurrent,
    /// A second call while one is pending fails with `AlreadyInProgress`
    SingleOutstanding,
}

/// Names of the exec pins fired for each kind of outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPins {
    #[serde(default = "default_success_pin")]
    pub success: String,
    #[serde(default = "default_failure_pin")]
    pub failure: String,
    #[serde(default = "default_cancel_pin")]
    pub cancelled: String,
}

fn default_success_pin() -> String {
    "then".to_string()
}

fn default_failure_pin() -> String {
    "failed".to_string()
}

fn default_cancel_pin() -> String {
    "cancelled".to_string()
}

impl Default for ResultPins {
    fn default() -> Self {
        Self {
            success: default_success_pin(),
            failure: default_failure_pin(),
            cancelled: default_cancel_pin(),
        }
    }
}

impl ResultPins {
    /// Exec output pins for an entry point definition
    pub fn exec_pins(&self) -> Vec<PinDef> {
        vec![
            PinDef::exec_out(&self.success),
            PinDef::exec_out(&self.failure),
            PinDef::exec_out(&self.cancelled),
        ]
    }
}

/// Definition of an entry point (registered in the EntryPointRegistry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPointDef {
    /// Unique identifier (e.g., "latent/Delay" or "asset/LoadAsset")
    pub id: String,
    /// Human-readable display name
    pub name: String,
    /// Category for organization (e.g., "Latent", "Asset")
    pub category: String,
    /// Whether this entry point suspends the graph until a result arrives
    #[serde(default)]
    pub latent: bool,
    /// Whether this entry point reaches engine internals and is feature gated
    #[serde(default)]
    pub dangerous: bool,
    /// Outstanding-request policy per context
    #[serde(default)]
    pub concurrency: Concurrency,
    /// Pins fired on completion
    #[serde(default)]
    pub result_pins: ResultPins,
    /// Pin definitions for this entry point
    pub pins: Vec<PinDef>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntryPointDef {
    /// Create a latent entry point with the default result pins
    pub fn latent(id: &str, name: &str, category: &str) -> Self {
        let result_pins = ResultPins::default();
        let mut pins = vec![PinDef::exec_in()];
        pins.extend(result_pins.exec_pins());
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            latent: true,
            dangerous: false,
            concurrency: Concurrency::Concurrent,
            result_pins,
            pins,
            description: None,
        }
    }

    /// Add a pin
    pub fn with_pin(mut self, pin: PinDef) -> Self {
        self.pins.push(pin);
        self
    }

    /// Set the concurrency policy
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Mark as dangerous
    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }

    /// Set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Get all input pins
    pub fn input_pins(&self) -> impl Iterator<Item = &PinDef> {
        self.pins
            .iter()
            .filter(|p| p.direction == PinDirection::Input)
    }

    /// Get all output pins
    pub fn output_pins(&self) -> impl Iterator<Item = &PinDef> {
        self.pins
            .iter()
            .filter(|p| p.direction == PinDirection::Output)
    }

    /// Get all data input pins
    pub fn data_inputs(&self) -> impl Iterator<Item = &PinDef> {
        self.input_pins().filter(|p| p.pin_type.is_data())
    }

    /// Get all execution output pins
    pub fn exec_outputs(&self) -> impl Iterator<Item = &PinDef> {
        self.output_pins().filter(|p| p.pin_type.is_exec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latent_def_has_result_pins() {
        let def = EntryPointDef::latent("latent/Delay", "Delay", "Latent")
            .with_pin(PinDef::data_in("duration", PinType::Real));

        let exec_out: Vec<_> = def.exec_outputs().map(|p| p.name.as_str()).collect();
        assert_eq!(exec_out, vec!["then", "failed", "cancelled"]);
        assert_eq!(def.data_inputs().count(), 1);
        assert!(def.latent);
        assert_eq!(def.concurrency, Concurrency::Concurrent);
    }

    #[test]
    fn test_def_json_defaults() {
        let json = r#"{
            "id": "event/WaitForEvent",
            "name": "Wait For Event",
            "category": "Event",
            "concurrency": "single_outstanding",
            "pins": []
        }"#;

        let def: EntryPointDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.concurrency, Concurrency::SingleOutstanding);
        assert_eq!(def.result_pins, ResultPins::default());
        assert!(!def.latent);
        assert!(!def.dangerous);
    }
}

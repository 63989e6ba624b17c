// Bridge Operations - Typed, validated latent operations
//
// Arguments are checked before anything is registered; a rejected call leaves
// no handle behind.

use std::time::Duration;

use latent_types::{Concurrency, ContextId, ResumePoint, TaskToken};

use super::{AsyncBridge, LatentRequest};
use crate::error::{BridgeError, BridgeResult};
use crate::platform::PlatformRequest;

pub const DELAY: &str = "latent/Delay";
pub const LOAD_ASSET: &str = "asset/LoadAsset";
pub const LOAD_PACKAGE: &str = "asset/LoadPackage";
pub const WAIT_FOR_EVENT: &str = "event/WaitForEvent";
#[cfg(feature = "dangerous")]
pub const SET_PROPERTY_VALUE: &str = "object/SetPropertyValue";
/// Internal timer racing an operation with a timeout
pub const TIMEOUT: &str = "latent/Timeout";

fn non_negative_seconds(name: &str, seconds: f64) -> BridgeResult<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(BridgeError::invalid(format!(
            "{name} must be a finite, non-negative number of seconds (got {seconds})"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| BridgeError::invalid(format!("{name} out of range: {e}")))
}

fn positive_seconds(name: &str, seconds: f64) -> BridgeResult<Duration> {
    let duration = non_negative_seconds(name, seconds)?;
    if duration.is_zero() {
        return Err(BridgeError::invalid(format!("{name} must be greater than zero")));
    }
    Ok(duration)
}

fn non_empty<'a>(name: &str, value: &'a str) -> BridgeResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::invalid(format!("{name} must not be empty")));
    }
    Ok(trimmed)
}

impl AsyncBridge {
    /// Resume after `seconds`
    pub fn delay(
        &self,
        owner: ContextId,
        resume: ResumePoint,
        seconds: f64,
    ) -> BridgeResult<TaskToken> {
        let duration = non_negative_seconds("duration", seconds)?;
        self.launch(LatentRequest::new(
            DELAY,
            owner,
            resume,
            PlatformRequest::Delay { duration },
        ))
    }

    /// Stream in an asset; every call starts a new load
    pub fn load_asset(
        &self,
        owner: ContextId,
        resume: ResumePoint,
        path: &str,
        priority: Option<i32>,
    ) -> BridgeResult<TaskToken> {
        let path = non_empty("path", path)?;
        self.launch(LatentRequest::new(
            LOAD_ASSET,
            owner,
            resume,
            PlatformRequest::LoadAsset {
                path: path.to_string(),
                priority: priority.unwrap_or(self.default_priority),
            },
        ))
    }

    /// Load a package
    ///
    /// With `block_on_load` the platform flushes the load inside the call, so
    /// the task is already settled when this returns. The graph still resumes
    /// at the next drain.
    pub fn load_package(
        &self,
        owner: ContextId,
        resume: ResumePoint,
        path: &str,
        priority: Option<i32>,
        block_on_load: bool,
    ) -> BridgeResult<TaskToken> {
        let path = non_empty("path", path)?;
        self.launch(LatentRequest::new(
            LOAD_PACKAGE,
            owner,
            resume,
            PlatformRequest::LoadPackage {
                path: path.to_string(),
                priority: priority.unwrap_or(self.default_priority),
                block_on_load,
            },
        ))
    }

    /// Wait for an engine event matching `pattern`
    ///
    /// At most one wait may be outstanding per context. With a timeout, the
    /// wait fails once `timeout` seconds pass without a match.
    pub fn wait_for_event(
        &self,
        owner: ContextId,
        resume: ResumePoint,
        pattern: &str,
        timeout: Option<f64>,
    ) -> BridgeResult<TaskToken> {
        let pattern = non_empty("pattern", pattern)?;
        let timeout = timeout
            .map(|secs| positive_seconds("timeout", secs))
            .transpose()?;

        let request = LatentRequest::new(
            WAIT_FOR_EVENT,
            owner,
            resume,
            PlatformRequest::WaitForEvent {
                owner,
                pattern: pattern.to_string(),
            },
        )
        .with_concurrency(Concurrency::SingleOutstanding);

        match timeout {
            Some(limit) => self.launch_with_timeout(request, limit),
            None => self.launch(request),
        }
    }

    /// Write a property on the context's engine object
    #[cfg(feature = "dangerous")]
    pub fn set_property_value(
        &self,
        owner: ContextId,
        resume: ResumePoint,
        property: &str,
        value: &str,
    ) -> BridgeResult<TaskToken> {
        let property = non_empty("property", property)?;
        self.launch(LatentRequest::new(
            SET_PROPERTY_VALUE,
            owner,
            resume,
            PlatformRequest::SetPropertyValue {
                owner,
                property: property.to_string(),
                value: value.to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_validation() {
        assert_eq!(
            non_negative_seconds("duration", 1.5).unwrap(),
            Duration::from_millis(1500)
        );
        assert!(non_negative_seconds("duration", 0.0).is_ok());
        assert!(non_negative_seconds("duration", -1.0).is_err());
        assert!(non_negative_seconds("duration", f64::NAN).is_err());
        assert!(non_negative_seconds("duration", f64::INFINITY).is_err());
        assert!(non_negative_seconds("duration", 1e300).is_err());
        assert!(positive_seconds("timeout", 0.0).is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("path", " /Game/Hero ").unwrap(), "/Game/Hero");
        assert!(matches!(
            non_empty("path", "   "),
            Err(BridgeError::InvalidArgument(msg)) if msg.contains("path")
        ));
    }
}

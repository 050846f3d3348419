// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serde helpers for encoding [`std::time::Duration`] values as (fractional) seconds.

use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
use std::time::Duration;

/// Serialize `Duration` to floating-point seconds.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Deserialize `Duration` from non-negative floating-point seconds.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct WithDuration {
        #[serde(with = "crate::duration_secs")]
        value: Duration,
    }

    #[test]
    fn whole_seconds() {
        let v: WithDuration = serde_json::from_str(r#"{"value": 300}"#).unwrap();
        assert_eq!(v.value, Duration::from_secs(300));
    }

    #[test]
    fn fractional_seconds() {
        let v: WithDuration = serde_json::from_str(r#"{"value": 0.25}"#).unwrap();
        assert_eq!(v.value, Duration::from_millis(250));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"value":0.25}"#);
    }

    #[test]
    fn negative_seconds_rejected() {
        assert!(serde_json::from_str::<WithDuration>(r#"{"value": -1}"#).is_err());
    }
}

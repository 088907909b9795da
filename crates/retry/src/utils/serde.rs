//! Serde adapters for configuration records

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a [`Duration`] as whole milliseconds
///
/// Configuration files spell delays as integers (`initial_delay = 10`), so
/// every duration field of the options records goes through this module.
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use clientrt_retry::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     max_backoff: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds (u64), saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the millisecond duration adapter.

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Backoff {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        scale_factor: f64,
    }

    /// Tests that milliseconds deserialize to Duration
    #[test]
    fn test_duration_millis_deserialize() {
        let json = r#"{"initial_delay":250,"scale_factor":2.0}"#;
        let data: Backoff = serde_json::from_str(json).expect("Should deserialize valid JSON");

        assert_eq!(data.initial_delay, Duration::from_millis(250));
        assert!((data.scale_factor - 2.0).abs() < f64::EPSILON);
    }

    /// Tests that sub-millisecond precision is truncated on output
    #[test]
    fn test_duration_millis_truncates_micros() {
        let data = Backoff { initial_delay: Duration::from_micros(1_999), scale_factor: 1.5 };

        let json = serde_json::to_string(&data).expect("Should serialize");
        assert!(json.contains("\"initial_delay\":1"), "got {json}");
    }

    /// Validates that a value beyond u64 milliseconds saturates instead of
    /// wrapping.
    ///
    /// Assertions:
    /// - Serialized output holds `u64::MAX`.
    #[test]
    fn test_duration_millis_saturates() {
        let data = Backoff { initial_delay: Duration::MAX, scale_factor: 1.0 };

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains(&u64::MAX.to_string()));
    }

    #[test]
    fn test_duration_millis_rejects_negative() {
        let json = r#"{"initial_delay":-5,"scale_factor":2.0}"#;
        assert!(serde_json::from_str::<Backoff>(json).is_err());
    }
}

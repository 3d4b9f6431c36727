use chrono::{DateTime, Utc};

use crate::quantity::power::Watts;

/// Power reading at a point in time.
///
/// The power is [`None`] when the sensor reported something that is not a number.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub power: Option<Watts>,
}

impl Sample {
    pub const fn new(timestamp: DateTime<Utc>, power: Option<Watts>) -> Self {
        Self { timestamp, power }
    }

    /// Parse the raw entity state.
    pub fn parse(timestamp: DateTime<Utc>, state: Option<&str>) -> Self {
        Self::new(timestamp, state.and_then(parse_power))
    }
}

fn parse_power(state: &str) -> Option<Watts> {
    match state.trim() {
        "unknown" | "unavailable" => None,
        state => state.parse::<f64>().ok().filter(|watts| watts.is_finite()).map(Watts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        let sample = Sample::parse(DateTime::UNIX_EPOCH, Some(" 123.5 "));
        assert_eq!(sample.power, Some(Watts(123.5)));
    }

    #[test]
    fn test_parse_absent() {
        for state in [None, Some("unknown"), Some("unavailable"), Some("on"), Some(""), Some("NaN")]
        {
            assert_eq!(Sample::parse(DateTime::UNIX_EPOCH, state).power, None, "{state:?}");
        }
    }
}

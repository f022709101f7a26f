use std::{error::Error, fmt::Display, num::ParseFloatError, ops::Range, str::FromStr};

use serde::{Deserialize, Serialize};

/// A retention time window, in minutes. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Whether `time` lies beyond the end of the window
    pub fn is_past(&self, time: f64) -> bool {
        time > self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
        }
    }
}

#[derive(Debug)]
pub enum TimeRangeParseError {
    MalformedStart(ParseFloatError),
    MalformedEnd(ParseFloatError),
}

impl Display for TimeRangeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeRangeParseError::MalformedStart(e) => {
                write!(f, "Failed to parse time range start {e}")
            }
            TimeRangeParseError::MalformedEnd(e) => {
                write!(f, "Failed to parse time range end {e}")
            }
        }
    }
}

impl Error for TimeRangeParseError {}

impl FromStr for TimeRange {
    type Err = TimeRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start_s, end_s) = if let Some(parts) = s.split_once(' ') {
            parts
        } else if let Some(parts) = s.split_once(':') {
            parts
        } else if let Some(parts) = s.split_once('-') {
            parts
        } else {
            (s, "")
        };

        let start = if start_s.is_empty() {
            0.0
        } else {
            start_s.parse().map_err(TimeRangeParseError::MalformedStart)?
        };
        let end = if end_s.is_empty() {
            f64::INFINITY
        } else {
            end_s.parse().map_err(TimeRangeParseError::MalformedEnd)?
        };
        Ok(TimeRange { start, end })
    }
}

impl From<Range<f64>> for TimeRange {
    fn from(value: Range<f64>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_time_fromstr() -> Result<(), TimeRangeParseError> {
        let t: TimeRange = "52.0-".parse()?;
        assert_eq!(t.start, 52.0);
        assert_eq!(t.end, f64::INFINITY);

        let t: TimeRange = "-52.0".parse()?;
        assert_eq!(t.start, 0.0);
        assert_eq!(t.end, 52.0);

        let t: TimeRange = "32-52.0".parse()?;
        assert_eq!(t.start, 32.0);
        assert_eq!(t.end, 52.0);

        let t: TimeRange = "1.5:3".parse()?;
        assert_eq!(t, TimeRange::new(1.5, 3.0));

        let t: TimeRange = "-".parse()?;
        assert_eq!(t, TimeRange::default());

        let t: TimeRange = "12".parse()?;
        assert_eq!(t.start, 12.0);
        assert_eq!(t.end, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_time_fromstr_malformed() {
        assert!(matches!(
            "a-".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedStart(_))
        ));
        assert!(matches!(
            "-b".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedEnd(_))
        ));
        // The start is checked first
        assert!(matches!(
            "a-b".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedStart(_))
        ));
    }

    #[test]
    fn test_contains() {
        let t = TimeRange::new(1.0, 2.0);
        assert!(t.contains(1.0));
        assert!(t.contains(2.0));
        assert!(!t.contains(2.01));
        assert!(t.is_past(2.01));
        assert!(!t.is_past(0.5));
        assert!(TimeRange::default().contains(1e9));
    }
}

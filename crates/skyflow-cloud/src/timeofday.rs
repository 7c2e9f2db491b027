//! Time-of-day values used by maintenance and backup windows
//!
//! Remote APIs and users spell the same instant differently (`1:5:0`,
//! `01:05:00`, hour/minute pairs). Everything is parsed into [`TimeOfDay`],
//! whose `Display` is always the canonical zero-padded `HH:MM:SS`.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(CloudError::MalformedInput(format!(
                "time of day out of range: {}:{}:{}",
                hour, minute, second
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Parse `H:M:S` (or `H:M`), one or two digits per field
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CloudError::MalformedInput("time cannot be empty".to_string()));
        }

        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(format_error(input));
        }

        let mut fields = [0u8; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format_error(input));
            }
            *slot = part.parse().map_err(|_| format_error(input))?;
        }

        let [hour, minute, second] = fields;
        Self::new(hour, minute, second).map_err(|_| format_error(input))
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }
}

fn format_error(input: &str) -> CloudError {
    CloudError::MalformedInput(format!(
        "invalid time of day '{}': expected HH:MM:SS",
        input
    ))
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(t: TimeOfDay) -> (u8, u8, u8) {
        (t.hour(), t.minute(), t.second())
    }

    #[test]
    fn test_parse_midnight() {
        assert_eq!(hms(TimeOfDay::parse("00:00:00").unwrap()), (0, 0, 0));
    }

    #[test]
    fn test_parse_single_digit_hour() {
        let t = TimeOfDay::parse("1:59:59").unwrap();
        assert_eq!(hms(t), (1, 59, 59));
        assert_eq!(t.to_string(), "01:59:59");
    }

    #[test]
    fn test_parse_without_seconds() {
        assert_eq!(TimeOfDay::parse("4:5").unwrap().to_string(), "04:05:00");
    }

    #[test]
    fn test_parse_empty() {
        let err = TimeOfDay::parse("").unwrap_err();
        assert!(err.to_string().contains("time cannot be empty"));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            TimeOfDay::parse("24:01:30"),
            Err(CloudError::MalformedInput(_))
        ));
        assert!(matches!(
            TimeOfDay::parse("23:60:00"),
            Err(CloudError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(TimeOfDay::parse("noon").is_err());
        assert!(TimeOfDay::parse("1:2:3:4").is_err());
        assert!(TimeOfDay::parse("001:00:00").is_err());
        assert!(TimeOfDay::parse("-1:00:00").is_err());
    }

    #[test]
    fn test_serde_canonical() {
        let t: TimeOfDay = serde_json::from_str("\"3:4:5\"").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"03:04:05\"");
    }
}

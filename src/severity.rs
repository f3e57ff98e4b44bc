//! Ordered log severities.
//!
//! Severities carry a stable numeric code so a threshold can live in an atomic
//! integer. Lower codes are more verbose.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the five ordered log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i64)]
pub enum Severity {
    #[default]
    Debug = 1,
    Warn = 2,
    Info = 3,
    Error = 4,
    Fatal = 5,
}

impl Severity {
    /// All severities, most verbose first.
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Warn,
        Severity::Info,
        Severity::Error,
        Severity::Fatal,
    ];

    /// The numeric code of this severity.
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Maps a numeric code to a severity.
    ///
    /// Codes outside `1..=5` are clamped to [`Severity::Debug`], never rejected.
    pub const fn from_code(code: i64) -> Self {
        match code {
            2 => Severity::Warn,
            3 => Severity::Info,
            4 => Severity::Error,
            5 => Severity::Fatal,
            _ => Severity::Debug,
        }
    }

    /// Upper-case label used in emitted lines.
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown severity '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Ok(Severity::from_code(code)),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_ordered() {
        let codes: Vec<i64> = Severity::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5]);
        assert!(Severity::Debug < Severity::Warn);
        assert!(Severity::Warn < Severity::Info);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_from_code_clamps_out_of_range() {
        assert_eq!(Severity::from_code(0), Severity::Debug);
        assert_eq!(Severity::from_code(-7), Severity::Debug);
        assert_eq!(Severity::from_code(6), Severity::Debug);
        assert_eq!(Severity::from_code(i64::MAX), Severity::Debug);
        assert_eq!(Severity::from_code(4), Severity::Error);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("INFO".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!(" fatal ".parse::<Severity>(), Ok(Severity::Fatal));
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_deserialize_name_or_code() {
        let from_name: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(from_name, Severity::Error);

        let from_code: Severity = serde_json::from_str("3").unwrap();
        assert_eq!(from_code, Severity::Info);

        let clamped: Severity = serde_json::from_str("42").unwrap();
        assert_eq!(clamped, Severity::Debug);

        assert!(serde_json::from_str::<Severity>("\"loud\"").is_err());
    }
}

//! Grant durations for the manual grant flow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use medvault_core::{Conditions, ValidationError};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// How long a manual grant lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessDuration {
    #[serde(rename = "24h")]
    #[default]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "permanent")]
    Permanent,
}

impl AccessDuration {
    pub const ALL: [AccessDuration; 4] = [
        AccessDuration::Day,
        AccessDuration::Week,
        AccessDuration::Month,
        AccessDuration::Permanent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDuration::Day => "24h",
            AccessDuration::Week => "7d",
            AccessDuration::Month => "30d",
            AccessDuration::Permanent => "permanent",
        }
    }

    /// Length in milliseconds, or `None` for permanent grants.
    pub fn millis(&self) -> Option<i64> {
        match self {
            AccessDuration::Day => Some(DAY_MS),
            AccessDuration::Week => Some(7 * DAY_MS),
            AccessDuration::Month => Some(30 * DAY_MS),
            AccessDuration::Permanent => None,
        }
    }

    /// Conditions for a grant issued at `now`.
    pub fn conditions(&self, now: i64) -> Conditions {
        match self.millis() {
            Some(ms) => Conditions::expires_at(now.saturating_add(ms)),
            None => Conditions::permanent(),
        }
    }
}

impl FromStr for AccessDuration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessDuration::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidDuration(s.to_string()))
    }
}

impl fmt::Display for AccessDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_durations() {
        assert_eq!("24h".parse::<AccessDuration>().unwrap(), AccessDuration::Day);
        assert_eq!("7d".parse::<AccessDuration>().unwrap(), AccessDuration::Week);
        assert_eq!("30d".parse::<AccessDuration>().unwrap(), AccessDuration::Month);
        assert_eq!(
            "permanent".parse::<AccessDuration>().unwrap(),
            AccessDuration::Permanent
        );
        assert!(matches!(
            "1y".parse::<AccessDuration>(),
            Err(ValidationError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_conditions_from_duration() {
        let now = 1_000;
        assert_eq!(
            AccessDuration::Day.conditions(now).expires_at,
            Some(now + DAY_MS)
        );
        assert_eq!(
            AccessDuration::Month.conditions(now).expires_at,
            Some(now + 30 * DAY_MS)
        );
        assert!(AccessDuration::Permanent.conditions(now).is_valid(i64::MAX));
    }

    #[test]
    fn test_week_grant_expires() {
        let cond = AccessDuration::Week.conditions(0);
        assert!(cond.is_valid(7 * DAY_MS));
        assert!(!cond.is_valid(7 * DAY_MS + 1));
    }
}

//! Auto-shutdown TTL and service-name rules used when spinning up a service.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;

use crate::error::ValidationError;

/// Longest accepted custom TTL (one week).
pub const MAX_TTL_HOURS: u32 = 168;

/// How long a freshly spun-up service lives before it is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttl {
    hours: u32,
}

impl Ttl {
    pub const ONE_HOUR: Ttl = Ttl { hours: 1 };
    pub const SIX_HOURS: Ttl = Ttl { hours: 6 };
    pub const ONE_DAY: Ttl = Ttl { hours: 24 };
    pub const ONE_WEEK: Ttl = Ttl { hours: MAX_TTL_HOURS };

    /// Custom TTL in whole hours, 1 through [`MAX_TTL_HOURS`].
    pub fn from_hours(hours: u32) -> Result<Self, ValidationError> {
        if hours == 0 || hours > MAX_TTL_HOURS {
            return Err(ValidationError::InvalidTtl(hours.to_string()));
        }
        Ok(Self { hours })
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn duration(&self) -> Duration {
        Duration::hours(i64::from(self.hours))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours == MAX_TTL_HOURS {
            f.write_str("1w")
        } else {
            write!(f, "{}h", self.hours)
        }
    }
}

impl FromStr for Ttl {
    type Err = ValidationError;

    /// Accepts the presets `1h`, `6h`, `24h`, `1w`, any `<n>h`, or a bare
    /// number of hours.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let invalid = || ValidationError::InvalidTtl(s.to_string());
        match trimmed.as_str() {
            "1w" => Ok(Self::ONE_WEEK),
            other => {
                let digits = other.strip_suffix('h').unwrap_or(other);
                let hours: u32 = digits.parse().map_err(|_| invalid())?;
                Self::from_hours(hours).map_err(|_| invalid())
            }
        }
    }
}

/// Check a new service name: letters, digits and hyphens, at least 2 chars.
pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidServiceName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is required"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("only letters, numbers and hyphens are allowed"));
    }
    if name.len() < 2 {
        return Err(invalid("must be at least 2 characters long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_presets() {
        assert_eq!("1h".parse::<Ttl>().unwrap(), Ttl::ONE_HOUR);
        assert_eq!("6h".parse::<Ttl>().unwrap(), Ttl::SIX_HOURS);
        assert_eq!("24h".parse::<Ttl>().unwrap(), Ttl::ONE_DAY);
        assert_eq!("1w".parse::<Ttl>().unwrap(), Ttl::ONE_WEEK);
    }

    #[test]
    fn parse_custom_hours() {
        assert_eq!("12".parse::<Ttl>().unwrap().hours(), 12);
        assert_eq!("48h".parse::<Ttl>().unwrap().duration(), Duration::hours(48));
    }

    #[test]
    fn reject_out_of_range() {
        assert!("0".parse::<Ttl>().is_err());
        assert!("169h".parse::<Ttl>().is_err());
        assert!("soon".parse::<Ttl>().is_err());
    }

    #[test]
    fn display_round_trips_presets() {
        assert_eq!(Ttl::ONE_WEEK.to_string(), "1w");
        assert_eq!(Ttl::SIX_HOURS.to_string(), "6h");
    }

    #[test]
    fn service_names() {
        assert!(validate_service_name("my-service").is_ok());
        assert!(validate_service_name("a").is_err());
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("bad_name").is_err());
    }
}

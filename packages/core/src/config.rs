use std::env;

use crate::catalog::{DEFAULT_LOAN_PERIOD_DAYS, DEFAULT_MAX_RENEWAL_WEEKS};

/// Longest accepted `LOAN_PERIOD_DAYS`, ten years.
pub const MAX_LOAN_PERIOD_DAYS: u32 = 3650;

/// Longest accepted `MAX_RENEWAL_WEEKS`, ten years.
pub const MAX_RENEWAL_WEEKS_LIMIT: u32 = 520;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub loan_period_days: u32,
    pub max_renewal_weeks: u32,
}

impl Config {
    /// Read settings from the process environment. A `--database-url`
    /// flag, when given, wins over `DATABASE_URL`.
    pub fn from_env(database_url_override: Option<String>) -> Result<Self, String> {
        Self::from_lookup(database_url_override, |key| env::var(key).ok())
    }

    fn from_lookup(
        database_url_override: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let database_url = database_url_override
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or("DATABASE_URL is required")?;

        let loan_period_days = parse_or_default(
            lookup("LOAN_PERIOD_DAYS"),
            "LOAN_PERIOD_DAYS",
            DEFAULT_LOAN_PERIOD_DAYS,
            MAX_LOAN_PERIOD_DAYS,
        )?;

        let max_renewal_weeks = parse_or_default(
            lookup("MAX_RENEWAL_WEEKS"),
            "MAX_RENEWAL_WEEKS",
            DEFAULT_MAX_RENEWAL_WEEKS,
            MAX_RENEWAL_WEEKS_LIMIT,
        )?;

        Ok(Self {
            database_url,
            loan_period_days,
            max_renewal_weeks,
        })
    }
}

fn parse_or_default(
    value: Option<String>,
    key: &str,
    default: u32,
    max: u32,
) -> Result<u32, String> {
    let parsed = match value {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| format!("{} must be a valid number", key))?,
        None => default,
    };
    if parsed > max {
        return Err(format!("{} must be at most {}", key, max));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let config =
            Config::from_lookup(None, lookup_from(&[("DATABASE_URL", "sqlite://lib.db")])).unwrap();
        assert_eq!(config.database_url, "sqlite://lib.db");
        assert_eq!(config.loan_period_days, 21);
        assert_eq!(config.max_renewal_weeks, 4);
    }

    #[test]
    fn override_wins_over_environment() {
        let config = Config::from_lookup(
            Some("sqlite::memory:".into()),
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db")]),
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(None, lookup_from(&[])).unwrap_err();
        assert_eq!(err, "DATABASE_URL is required");
    }

    #[test]
    fn invalid_loan_period_is_an_error() {
        let err = Config::from_lookup(
            None,
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db"), ("LOAN_PERIOD_DAYS", "three")]),
        )
        .unwrap_err();
        assert_eq!(err, "LOAN_PERIOD_DAYS must be a valid number");
    }

    #[test]
    fn invalid_max_renewal_weeks_is_an_error() {
        let err = Config::from_lookup(
            None,
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db"), ("MAX_RENEWAL_WEEKS", "-1")]),
        )
        .unwrap_err();
        assert_eq!(err, "MAX_RENEWAL_WEEKS must be a valid number");
    }

    #[test]
    fn loan_settings_read_from_environment() {
        let config = Config::from_lookup(
            None,
            lookup_from(&[
                ("DATABASE_URL", "sqlite://lib.db"),
                ("LOAN_PERIOD_DAYS", "14"),
                ("MAX_RENEWAL_WEEKS", "8"),
            ]),
        )
        .unwrap();
        assert_eq!(config.loan_period_days, 14);
        assert_eq!(config.max_renewal_weeks, 8);
    }

    #[test]
    fn zero_loan_settings_are_accepted() {
        let config = Config::from_lookup(
            None,
            lookup_from(&[
                ("DATABASE_URL", "sqlite://lib.db"),
                ("LOAN_PERIOD_DAYS", "0"),
                ("MAX_RENEWAL_WEEKS", "0"),
            ]),
        )
        .unwrap();
        assert_eq!(config.loan_period_days, 0);
        assert_eq!(config.max_renewal_weeks, 0);
    }

    #[test]
    fn loan_settings_at_the_limit_are_accepted() {
        let config = Config::from_lookup(
            None,
            lookup_from(&[
                ("DATABASE_URL", "sqlite://lib.db"),
                ("LOAN_PERIOD_DAYS", "3650"),
                ("MAX_RENEWAL_WEEKS", "520"),
            ]),
        )
        .unwrap();
        assert_eq!(config.loan_period_days, MAX_LOAN_PERIOD_DAYS);
        assert_eq!(config.max_renewal_weeks, MAX_RENEWAL_WEEKS_LIMIT);
    }

    #[test]
    fn loan_period_above_limit_is_an_error() {
        let err = Config::from_lookup(
            None,
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db"), ("LOAN_PERIOD_DAYS", "3651")]),
        )
        .unwrap_err();
        assert_eq!(err, "LOAN_PERIOD_DAYS must be at most 3650");

        let err = Config::from_lookup(
            None,
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db"), ("LOAN_PERIOD_DAYS", "4294967295")]),
        )
        .unwrap_err();
        assert_eq!(err, "LOAN_PERIOD_DAYS must be at most 3650");
    }

    #[test]
    fn max_renewal_weeks_above_limit_is_an_error() {
        let err = Config::from_lookup(
            None,
            lookup_from(&[("DATABASE_URL", "sqlite://lib.db"), ("MAX_RENEWAL_WEEKS", "4294967295")]),
        )
        .unwrap_err();
        assert_eq!(err, "MAX_RENEWAL_WEEKS must be at most 520");
    }
}

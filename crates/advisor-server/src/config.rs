//! Server Configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Capital the advisor sizes positions against
    pub capital: Decimal,

    /// Fraction of capital risked per trade
    pub risk_per_trade: Decimal,

    /// Hourly candles fetched per market analysis
    pub candle_limit: usize,

    /// Advisor sessions idle this long are dropped
    pub session_ttl_minutes: i64,

    /// Upper bound on live advisor sessions
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            capital: Decimal::from(1_000_000),
            risk_per_trade: Decimal::new(2, 2),
            candle_limit: 200,
            session_ttl_minutes: 60,
            max_sessions: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> anyhow::Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.session_ttl_minutes)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .with_context(|| {
                format!("ADVISOR_SESSION_TTL_MINUTES is out of range: {}", self.session_ttl_minutes)
            })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            capital: parse_var(&lookup, "ADVISOR_CAPITAL", defaults.capital)?,
            risk_per_trade: parse_var(&lookup, "ADVISOR_RISK_PER_TRADE", defaults.risk_per_trade)?,
            candle_limit: parse_var(&lookup, "ADVISOR_CANDLE_LIMIT", defaults.candle_limit)?,
            session_ttl_minutes: parse_var(
                &lookup,
                "ADVISOR_SESSION_TTL_MINUTES",
                defaults.session_ttl_minutes,
            )?,
            max_sessions: parse_var(&lookup, "ADVISOR_MAX_SESSIONS", defaults.max_sessions)?,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is not valid: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).into(), (*v).into()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.capital, dec!(1000000));
        assert_eq!(config.risk_per_trade, dec!(0.02));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("ADVISOR_CAPITAL", "5000000"),
            ("ADVISOR_RISK_PER_TRADE", " 0.01 "),
            ("ADVISOR_CANDLE_LIMIT", "300"),
            ("ADVISOR_SESSION_TTL_MINUTES", "15"),
            ("ADVISOR_MAX_SESSIONS", "50"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.capital, dec!(5000000));
        assert_eq!(config.risk_per_trade, dec!(0.01));
        assert_eq!(config.candle_limit, 300);
        assert_eq!(config.session_ttl().unwrap(), chrono::Duration::minutes(15));
        assert_eq!(config.max_sessions, 50);
    }

    #[test]
    fn test_session_ttl_must_be_positive() {
        let config =
            ServerConfig::from_lookup(lookup(&[("ADVISOR_SESSION_TTL_MINUTES", "0")])).unwrap();
        assert!(config.session_ttl().is_err());

        let huge = ServerConfig {
            session_ttl_minutes: i64::MAX,
            ..ServerConfig::default()
        };
        assert!(huge.session_ttl().is_err());
    }

    #[test]
    fn test_invalid_value_names_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("ADVISOR_CAPITAL", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ADVISOR_CAPITAL"));
    }
}

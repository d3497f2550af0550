//! Environment-driven configuration for the API process.

use std::net::SocketAddr;

use thiserror::Error;

use commerce_core::Money;
use commerce_infra::services::ServicesConfig;
use commerce_pricing::PricingPolicy;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub persistence: Persistence,
    pub services: ServicesConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("COMMERCE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("COMMERCE_BIND_ADDR", e))?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
            });
        }

        let persistent = match get("USE_PERSISTENT_STORES") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|e| invalid("USE_PERSISTENT_STORES", e))?,
            None => false,
        };
        let persistence = if persistent {
            Persistence::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            }
        } else {
            Persistence::InMemory
        };

        let mut services = ServicesConfig::default();
        if let Some(prefix) = get("ORDER_NUMBER_PREFIX") {
            services.order_number_prefix = prefix;
        }
        services.pricing = PricingPolicy {
            tax_rate_bps: parse_or("TAX_RATE_BPS", get("TAX_RATE_BPS"), 0)?,
            flat_shipping: Money::from_minor(parse_or("FLAT_SHIPPING_CENTS", get("FLAT_SHIPPING_CENTS"), 0)?),
            free_shipping_over: get("FREE_SHIPPING_OVER_CENTS")
                .map(|v| v.parse::<u64>().map(Money::from_minor))
                .transpose()
                .map_err(|e| invalid("FREE_SHIPPING_OVER_CENTS", e))?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            persistence,
            services,
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_need_only_a_secret() {
        let cfg = config(&[("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.persistence, Persistence::InMemory);
        assert_eq!(cfg.services.order_number_prefix, "ORD");
        assert_eq!(cfg.services.pricing, PricingPolicy::default());
    }

    #[test]
    fn secret_is_required_and_must_be_long() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert!(matches!(
            config(&[("JWT_SECRET", "short")]),
            Err(ConfigError::Invalid { name: "JWT_SECRET", .. })
        ));
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        assert_eq!(
            config(&[("JWT_SECRET", SECRET), ("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let cfg = config(&[
            ("JWT_SECRET", SECRET),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/commerce"),
        ])
        .unwrap();
        assert!(matches!(cfg.persistence, Persistence::Postgres { .. }));
    }

    #[test]
    fn pricing_knobs_are_read_in_cents() {
        let cfg = config(&[
            ("JWT_SECRET", SECRET),
            ("TAX_RATE_BPS", "2000"),
            ("FLAT_SHIPPING_CENTS", "499"),
            ("FREE_SHIPPING_OVER_CENTS", "5000"),
        ])
        .unwrap();
        assert_eq!(cfg.services.pricing.tax_rate_bps, 2_000);
        assert_eq!(cfg.services.pricing.flat_shipping, Money::from_minor(499));
        assert_eq!(cfg.services.pricing.free_shipping_over, Some(Money::from_minor(5_000)));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        assert!(matches!(
            config(&[("JWT_SECRET", SECRET), ("TAX_RATE_BPS", "lots")]),
            Err(ConfigError::Invalid { name: "TAX_RATE_BPS", .. })
        ));
    }
}

use {
    crate::domain::{
        amount_policy::AmountPolicy,
        money::{Currency, MoneyAmount},
    },
    std::{env, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub checkout_url: String,
    pub public_key: String,
    pub private_key: String,
    pub integrity_secret: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub events_secret: String,
    pub require_signature: bool,
    pub orphan_retention: chrono::Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub gateway: GatewaySettings,
    pub webhooks: WebhookSettings,
    pub amount_policy: AmountPolicy,
    pub payment_window: chrono::Duration,
}

impl Settings {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    key,
                    reason: format!("{e}"),
                }),
            }
        };

        let gateway = GatewaySettings {
            base_url: lookup("GATEWAY_BASE_URL")
                .unwrap_or_else(|| "https://sandbox.wompi.co/v1".to_string()),
            checkout_url: lookup("GATEWAY_CHECKOUT_URL")
                .unwrap_or_else(|| "https://checkout.wompi.co".to_string()),
            public_key: required("GATEWAY_PUBLIC_KEY")?,
            private_key: required("GATEWAY_PRIVATE_KEY")?,
            integrity_secret: required("GATEWAY_INTEGRITY_SECRET")?,
            timeout: Duration::from_secs(number("GATEWAY_TIMEOUT_SECS", 15)?),
        };

        let require_signature = match lookup("WEBHOOK_REQUIRE_SIGNATURE") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "WEBHOOK_REQUIRE_SIGNATURE",
                reason: format!("expected true/false, got {raw:?}"),
            })?,
        };

        let webhooks = WebhookSettings {
            events_secret: required("GATEWAY_EVENTS_SECRET")?,
            require_signature,
            orphan_retention: chrono::Duration::days(
                number("ORPHAN_RETENTION_DAYS", 7)? as i64,
            ),
            sweep_interval: Duration::from_secs(number("ORPHAN_SWEEP_INTERVAL_SECS", 3600)?),
        };

        let amount_policy = match lookup("AMOUNT_BOUNDS") {
            None => AmountPolicy::default(),
            Some(raw) => parse_amount_bounds(&raw)?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            gateway,
            webhooks,
            amount_policy,
            payment_window: chrono::Duration::hours(
                number("PURCHASE_PAYMENT_WINDOW_HOURS", 24)? as i64,
            ),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `COP=150000:2000000000,USD=100:1000000`. Currencies not listed are
/// unsupported.
///
/// Without `AMOUNT_BOUNDS` the gateway's own COP floor of 150000 minor
/// units applies, so smaller clinic charges need bounds configured here.
pub fn parse_amount_bounds(raw: &str) -> Result<AmountPolicy, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "AMOUNT_BOUNDS",
        reason,
    };
    let amount = |s: &str| -> Result<MoneyAmount, ConfigError> {
        s.trim()
            .parse::<i64>()
            .ok()
            .and_then(|n| MoneyAmount::new(n).ok())
            .ok_or_else(|| invalid(format!("bad amount {s:?}")))
    };

    let mut policy = AmountPolicy::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (currency, range) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected CUR=min:max, got {entry:?}")))?;
        let (min, max) = range
            .split_once(':')
            .ok_or_else(|| invalid(format!("expected min:max, got {range:?}")))?;

        let currency =
            Currency::try_from(currency.trim()).map_err(|e| invalid(e.to_string()))?;
        let (min, max) = (amount(min)?, amount(max)?);
        if min > max {
            return Err(invalid(format!("{currency} min {min} exceeds max {max}")));
        }
        policy = policy.with_bounds(currency, min, max);
    }
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("GATEWAY_PUBLIC_KEY", "pub_test_x"),
            ("GATEWAY_PRIVATE_KEY", "prv_test_x"),
            ("GATEWAY_INTEGRITY_SECRET", "test_integrity"),
            ("GATEWAY_EVENTS_SECRET", "test_events"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Settings, ConfigError> {
        Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_absent() {
        let settings = load(&base()).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert!(settings.webhooks.require_signature);
        assert_eq!(settings.webhooks.orphan_retention, chrono::Duration::days(7));
        assert_eq!(settings.webhooks.sweep_interval, Duration::from_secs(3600));
        assert_eq!(settings.gateway.timeout, Duration::from_secs(15));
        assert!(settings.amount_policy.bounds(Currency::Cop).is_some());
    }

    #[test]
    fn missing_secret_is_reported_by_key() {
        let mut vars = base();
        vars.remove("GATEWAY_EVENTS_SECRET");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GATEWAY_EVENTS_SECRET")));
    }

    #[test]
    fn amount_bounds_override_defaults() {
        let mut vars = base();
        vars.insert("AMOUNT_BOUNDS", "COP=100:500000");
        let settings = load(&vars).unwrap();

        let cop = settings.amount_policy.bounds(Currency::Cop).unwrap();
        assert_eq!(cop.min.minor_units(), 100);
        assert_eq!(cop.max.minor_units(), 500_000);
        assert!(settings.amount_policy.bounds(Currency::Usd).is_none());
    }

    #[test]
    fn small_cop_charges_need_configured_bounds() {
        let small = MoneyAmount::new(50_000).unwrap();
        assert!(load(&base()).unwrap().amount_policy.validate(small, Currency::Cop).is_err());

        let mut vars = base();
        vars.insert("AMOUNT_BOUNDS", "COP=100:2000000000,USD=100:1000000");
        let policy = load(&vars).unwrap().amount_policy;
        assert!(policy.validate(small, Currency::Cop).is_ok());
        assert!(policy.validate(MoneyAmount::new(50).unwrap(), Currency::Cop).is_err());
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        assert!(parse_amount_bounds("COP=100").is_err());
        assert!(parse_amount_bounds("EUR=1:2").is_err());
        assert!(parse_amount_bounds("COP=900:100").is_err());
    }

    #[test]
    fn signature_requirement_can_be_relaxed() {
        let mut vars = base();
        vars.insert("WEBHOOK_REQUIRE_SIGNATURE", "false");
        assert!(!load(&vars).unwrap().webhooks.require_signature);

        vars.insert("WEBHOOK_REQUIRE_SIGNATURE", "maybe");
        assert!(load(&vars).is_err());
    }
}

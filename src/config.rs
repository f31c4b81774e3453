use super::gateway::DEFAULT_TIMEOUT;
use super::money::DEFAULT_WITHDRAWAL_PERCENT;
use anyhow::Context;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub paystack_base_url: String,
    pub paystack_secret_key: Option<String>,
    pub customer_email: String,
    pub gateway_timeout: Duration,
    pub withdrawal_percent: Decimal,
    pub service_fee: Decimal,
    pub delivery_fee: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("ledger.db"),
            paystack_base_url: "https://api.paystack.co".to_string(),
            paystack_secret_key: None,
            customer_email: "customer@example.com".to_string(),
            gateway_timeout: DEFAULT_TIMEOUT,
            withdrawal_percent: DEFAULT_WITHDRAWAL_PERCENT,
            service_fee: dec!(5),
            delivery_fee: Decimal::ZERO,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        let defaults = Config::default();

        Ok(Config {
            db_path: env::var("LEDGER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or(defaults.paystack_base_url),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY").ok(),
            customer_email: env::var("CUSTOMER_EMAIL").unwrap_or(defaults.customer_email),
            gateway_timeout: match env::var("GATEWAY_TIMEOUT_SECS") {
                Ok(raw) => Duration::from_secs(
                    raw.parse().context("GATEWAY_TIMEOUT_SECS must be whole seconds")?,
                ),
                Err(_) => defaults.gateway_timeout,
            },
            withdrawal_percent: decimal_var("WITHDRAWAL_PERCENT", defaults.withdrawal_percent)?,
            service_fee: decimal_var("SERVICE_FEE", defaults.service_fee)?,
            delivery_fee: decimal_var("DELIVERY_FEE", defaults.delivery_fee)?,
        })
    }

    /// Only commands that reach the payment gateway need the secret.
    pub fn secret_key(&self) -> anyhow::Result<&str> {
        self.paystack_secret_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("PAYSTACK_SECRET_KEY must be set")
    }
}

fn decimal_var(name: &str, default: Decimal) -> anyhow::Result<Decimal> {
    match env::var(name) {
        Ok(raw) => parse_decimal(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_decimal(name: &str, raw: &str) -> anyhow::Result<Decimal> {
    let value: Decimal = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a decimal number, got {raw:?}"))?;
    if value.is_sign_negative() && !value.is_zero() {
        anyhow::bail!("{name} must not be negative");
    }
    Ok(value)
}

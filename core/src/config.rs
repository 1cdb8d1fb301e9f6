// core/src/config.rs

use crate::error::{MarketError, MarketResult};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Terms that hold a review for manual moderation.
pub const DEFAULT_REVIEW_DENYLIST: &[&str] = &[
  "scam", "fraud", "fake", "spam", "cheat", "stupid", "idiot", "hate", "damn", "shit", "fuck", "bastard",
];

/// Whether the overall order status follows the sub-orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverallStatusPolicy {
  /// Only the administrative channel moves the overall status.
  #[default]
  Manual,
  /// After a vendor-scoped transition, advance the overall status to the
  /// least advanced live sub-order when that is a legal forward move.
  DeriveFromSubOrders,
}

impl FromStr for OverallStatusPolicy {
  type Err = MarketError;

  fn from_str(text: &str) -> Result<Self, Self::Err> {
    match text.trim().to_ascii_lowercase().as_str() {
      "manual" => Ok(Self::Manual),
      "derive_from_sub_orders" | "derive" => Ok(Self::DeriveFromSubOrders),
      other => Err(MarketError::Config(format!("Invalid overall status policy '{}'", other))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
  /// Percentage used when a vendor has no commission rate of its own.
  pub default_commission_rate: Decimal,
  pub vendor_registration_timeout: Duration,
  pub order_code_prefix: String,
  pub order_code_suffix_len: usize,
  pub review_denylist: Vec<String>,
  /// Compare-and-swap attempts before giving up with `Conflict`.
  pub cas_max_attempts: u32,
  pub aggregate_recompute_attempts: u32,
  pub overall_status_policy: OverallStatusPolicy,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      default_commission_rate: crate::models::money::DEFAULT_COMMISSION_RATE,
      vendor_registration_timeout: Duration::from_secs(20),
      order_code_prefix: "ORD".to_string(),
      order_code_suffix_len: 4,
      review_denylist: DEFAULT_REVIEW_DENYLIST.iter().map(|s| s.to_string()).collect(),
      cas_max_attempts: 5,
      aggregate_recompute_attempts: 3,
      overall_status_policy: OverallStatusPolicy::Manual,
    }
  }
}

impl MarketConfig {
  /// Defaults overridden by `MARKET_*` environment variables.
  pub fn from_env() -> MarketResult<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());
    let parse = |var_name: &str, raw: String| -> MarketResult<u64> {
      raw
        .trim()
        .parse::<u64>()
        .map_err(|e| MarketError::Config(format!("Invalid {}: {}", var_name, e)))
    };

    let mut config = Self::default();

    if let Some(raw) = get_env("MARKET_DEFAULT_COMMISSION_RATE") {
      let rate = Decimal::from_str(raw.trim())
        .map_err(|e| MarketError::Config(format!("Invalid MARKET_DEFAULT_COMMISSION_RATE: {}", e)))?;
      if !crate::models::money::is_valid_rate(rate) {
        return Err(MarketError::Config(format!(
          "MARKET_DEFAULT_COMMISSION_RATE must be within 0..=100, got {}",
          rate
        )));
      }
      config.default_commission_rate = rate;
    }
    if let Some(raw) = get_env("MARKET_VENDOR_REGISTRATION_TIMEOUT_SECS") {
      config.vendor_registration_timeout = Duration::from_secs(parse("MARKET_VENDOR_REGISTRATION_TIMEOUT_SECS", raw)?);
    }
    if let Some(raw) = get_env("MARKET_ORDER_CODE_PREFIX") {
      config.order_code_prefix = raw.trim().to_ascii_uppercase();
    }
    if let Some(raw) = get_env("MARKET_ORDER_CODE_SUFFIX_LEN") {
      config.order_code_suffix_len = parse("MARKET_ORDER_CODE_SUFFIX_LEN", raw)? as usize;
    }
    if let Some(raw) = get_env("MARKET_REVIEW_DENYLIST_EXTRA") {
      config.review_denylist.extend(
        raw
          .split(',')
          .map(|term| term.trim().to_lowercase())
          .filter(|term| !term.is_empty()),
      );
    }
    if let Some(raw) = get_env("MARKET_CAS_MAX_ATTEMPTS") {
      config.cas_max_attempts = parse("MARKET_CAS_MAX_ATTEMPTS", raw)? as u32;
    }
    if let Some(raw) = get_env("MARKET_AGGREGATE_RECOMPUTE_ATTEMPTS") {
      config.aggregate_recompute_attempts = parse("MARKET_AGGREGATE_RECOMPUTE_ATTEMPTS", raw)? as u32;
    }
    if let Some(raw) = get_env("MARKET_OVERALL_STATUS_POLICY") {
      config.overall_status_policy = raw.parse()?;
    }

    config.validate()?;
    tracing::info!(policy = ?config.overall_status_policy, "Marketplace configuration loaded.");
    Ok(config)
  }

  pub fn validate(&self) -> MarketResult<()> {
    if self.cas_max_attempts == 0 {
      return Err(MarketError::Config("cas_max_attempts must be at least 1".to_string()));
    }
    if self.aggregate_recompute_attempts == 0 {
      return Err(MarketError::Config(
        "aggregate_recompute_attempts must be at least 1".to_string(),
      ));
    }
    if self.order_code_suffix_len == 0 || self.order_code_suffix_len > 12 {
      return Err(MarketError::Config("order_code_suffix_len must be within 1..=12".to_string()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn policy_parses_both_spellings() {
    assert_eq!(
      "derive_from_sub_orders".parse::<OverallStatusPolicy>().unwrap(),
      OverallStatusPolicy::DeriveFromSubOrders
    );
    assert_eq!("Manual".parse::<OverallStatusPolicy>().unwrap(), OverallStatusPolicy::Manual);
    assert!("sometimes".parse::<OverallStatusPolicy>().is_err());
  }

  #[test]
  fn defaults_are_valid() {
    let config = MarketConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.default_commission_rate, Decimal::TEN);
    assert_eq!(config.vendor_registration_timeout, Duration::from_secs(20));
  }
}

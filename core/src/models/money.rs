// core/src/models/money.rs

//! Currency arithmetic. Every stored amount is a `Decimal` with two places.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Platform commission applied when a vendor record carries none.
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::TEN;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rounds to cents, half away from zero.
pub fn round2(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `price × quantity`, rounded to cents. `None` when the product leaves the
/// `Decimal` range.
pub fn line_total(unit_price: Decimal, quantity: u32) -> Option<Decimal> {
  unit_price.checked_mul(Decimal::from(quantity)).map(round2)
}

/// Platform fee for `gross` at `rate_percent`. With the rate in `0..=100`
/// the fee never exceeds `gross`, so the fallback division cannot overflow.
pub fn commission_fee(gross: Decimal, rate_percent: Decimal) -> Decimal {
  match gross.checked_mul(rate_percent) {
    Some(scaled) => round2(scaled / HUNDRED),
    None => round2(gross * (rate_percent / HUNDRED)),
  }
}

pub fn is_valid_rate(rate_percent: Decimal) -> bool {
  rate_percent >= Decimal::ZERO && rate_percent <= HUNDRED
}

/// Mean of `ratings` to one decimal place; `0.0` for an empty set.
pub fn mean_rating(ratings: &[u8]) -> f64 {
  if ratings.is_empty() {
    return 0.0;
  }
  let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
  let mean = Decimal::from(sum) / Decimal::from(ratings.len() as u64);
  mean
    .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    .to_f64()
    .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dec(text: &str) -> Decimal {
    text.parse().unwrap()
  }

  #[test]
  fn fee_and_net_conserve_gross() {
    let gross = dec("333.33");
    let fee = commission_fee(gross, dec("12.5"));
    assert_eq!(fee, dec("41.67"));
    assert_eq!(fee + (gross - fee), gross);
  }

  #[test]
  fn ratings_round_to_one_decimal() {
    assert_eq!(mean_rating(&[5, 4, 4]), 4.3);
    assert_eq!(mean_rating(&[5, 5]), 5.0);
    assert_eq!(mean_rating(&[]), 0.0);
  }

  #[test]
  fn line_total_multiplies_exactly() {
    assert_eq!(line_total(dec("0.1"), 3), Some(dec("0.3")));
    assert_eq!(line_total(dec("500"), 2), Some(dec("1000")));
    assert_eq!(line_total(dec("10000000000000000000000000000"), 100), None);
  }

  #[test]
  fn fee_on_huge_gross_stays_in_range() {
    let gross = Decimal::MAX;
    let fee = commission_fee(gross, dec("10"));
    assert!(fee > Decimal::ZERO && fee < gross);
    assert_eq!(commission_fee(gross, Decimal::ZERO), Decimal::ZERO);
  }
}

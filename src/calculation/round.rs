//! Payout rounding policy.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a payout amount to 2 decimal places using round-half-up.
///
/// Applied exactly once, at the point a component's final payout is
/// produced — never mid-expression — so component sums and totals are
/// bit-for-bit reproducible from the same configuration and inputs.
///
/// # Example
///
/// ```
/// use payout_engine::calculation::round_payout;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let raw = Decimal::from_str("107.025").unwrap();
/// assert_eq!(round_payout(raw), Decimal::from_str("107.03").unwrap());
/// ```
pub fn round_payout(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

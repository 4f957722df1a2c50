//! Basket valuation: per-currency dollar value, basket total and coverage.
//!
//! Every multiply-then-divide in the engine funnels through
//! [`mul_div_floor`] so the truncation order (multiply fully in a wide lane,
//! then divide once, flooring) is enforced in exactly one place. The
//! settlement ledger computes this way; reordering changes results at the
//! unit level and would make quotes drift from execution.

use crate::currency::Currency;
use crate::ledger::PoolState;
use crate::pricing::{Prices, MICRO_USD};

/// Basis-point scale: 10_000 bps = 100%.
pub const BPS_SCALE: u64 = 10_000;

/// `floor(a * b / den)` with the product taken in full 128-bit precision.
///
/// `den == 0` yields `0`; callers must reject zero denominators upstream
/// (an unavailable price never reaches this point).
pub fn mul_div_floor(a: u64, b: u64, den: u64) -> u64 {
    if den == 0 {
        return 0;
    }
    let v = (a as u128) * (b as u128) / (den as u128);
    v.min(u64::MAX as u128) as u64
}

/// Dollar value of a balance in micro-dollars.
///
/// Balances are base units at 6 decimals and prices are micro-dollars per
/// whole unit, so the two scales cancel into micro-dollars.
pub fn value_of(balance: u64, price_micro_usd: u64) -> u64 {
    mul_div_floor(balance, price_micro_usd, MICRO_USD)
}

/// Snapshot valuation of the whole basket under one price set.
#[derive(Debug, Clone, Copy)]
pub struct BasketValuation {
    values: [u64; Currency::ALL.len()],
    /// Reserve plus the sum of regional values, micro-dollars.
    pub total: u64,
}

impl BasketValuation {
    /// Micro-dollar value of one currency's pool balance.
    pub fn value(&self, c: Currency) -> u64 {
        self.values[c.idx()]
    }

    /// The currency's share of total basket value, in bps. Zero when the
    /// basket is empty.
    pub fn coverage_bps(&self, c: Currency) -> u64 {
        if self.total == 0 {
            return 0;
        }
        mul_div_floor(self.value(c), BPS_SCALE, self.total)
    }
}

/// Value the pool under `prices`.
///
/// The reference reserve counts at face value; regional liabilities are
/// marked at their supplied price. A regional whose price is unavailable
/// (zero) contributes zero value; the trade legs themselves are validated
/// against unavailable prices before any valuation runs.
pub fn value_basket(pool: &PoolState, prices: &Prices) -> BasketValuation {
    let mut values = [0u64; Currency::ALL.len()];
    values[Currency::Usdc.idx()] = pool.balance(Currency::Usdc);
    let mut total = values[Currency::Usdc.idx()];
    for c in Currency::REGIONALS {
        let v = value_of(pool.balance(c), prices.get(c));
        values[c.idx()] = v;
        total = total.saturating_add(v);
    }
    BasketValuation { values, total }
}

//! Fee tiers for swap/unstake payouts plus the flat stake (deposit) fee.
//!
//! The settlement ledger gates fees with a discrete bucket table keyed on
//! destination-pool utilization and the trade's withdrawal fraction, both in
//! bps. Product docs describe this as a smooth three-tier curve; the number
//! that actually settles comes from this table, so the table is what we
//! reproduce. None of these constants are configurable: an override here
//! could only make a quote diverge from what the ledger executes.

use crate::valuation::{mul_div_floor, BPS_SCALE};

/// Base fee for swaps while the destination pool is healthy.
pub const SWAP_BASE_FEE_BPS: u64 = 5;
/// Base fee for unstakes/withdrawals while the destination pool is healthy.
pub const UNSTAKE_BASE_FEE_BPS: u64 = 30;
/// Flat deposit fee; stakes are never tiered.
pub const STAKE_FEE_BPS: u64 = 10;

// Bucket thresholds (bps).
const UTIL_HEALTHY_MAX: u64 = 7_000;
const UTIL_STEEP: u64 = 8_000;
const UTIL_CRITICAL: u64 = 9_000;
const WITHDRAWAL_HEALTHY_MAX: u64 = 3_000;
const WITHDRAWAL_STEEP: u64 = 5_000;

// Unhealthy-branch fees (bps).
const FEE_CRITICAL: u64 = 5_000;
const FEE_STEEP: u64 = 4_500;
const FEE_ELEVATED: u64 = 4_000;

/// Display classification for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Healthy = 1,
    Unhealthy = 2,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

pub fn tier(utilization_bps: u64, withdrawal_pct_bps: u64) -> Tier {
    if utilization_bps > UTIL_HEALTHY_MAX || withdrawal_pct_bps > WITHDRAWAL_HEALTHY_MAX {
        Tier::Unhealthy
    } else {
        Tier::Healthy
    }
}

/// The ledger's fee bucket table. Branch order matters: the clauses are
/// evaluated exactly as the ledger evaluates them, so a very large withdrawal
/// from a moderately utilized pool lands on the 5_000 bucket, not 4_000.
pub fn fee_bps(utilization_bps: u64, withdrawal_pct_bps: u64, base_fee_bps: u64) -> u64 {
    if utilization_bps <= UTIL_HEALTHY_MAX && withdrawal_pct_bps <= WITHDRAWAL_HEALTHY_MAX {
        base_fee_bps
    } else if utilization_bps > UTIL_CRITICAL {
        FEE_CRITICAL
    } else if utilization_bps > UTIL_STEEP {
        FEE_STEEP
    } else if withdrawal_pct_bps > WITHDRAWAL_STEEP {
        FEE_CRITICAL
    } else {
        FEE_ELEVATED
    }
}

/// Fraction of the destination pool this trade withdraws, in bps.
pub fn withdrawal_pct_bps(to_remaining: u64, amount_out_before_fee: u64) -> u64 {
    let total_staked = to_remaining.saturating_add(amount_out_before_fee);
    if total_staked == 0 {
        return 0;
    }
    mul_div_floor(amount_out_before_fee, BPS_SCALE, total_staked)
}

/// Destination-pool utilization in bps.
///
/// An empty destination pool is fully utilized by convention. The remaining
/// branches mirror the ledger's own structure even where they coincide
/// numerically with the withdrawal fraction.
pub fn utilization_bps(to_remaining: u64, amount_out_before_fee: u64) -> u64 {
    if to_remaining == 0 {
        return BPS_SCALE;
    }
    if to_remaining < amount_out_before_fee {
        return mul_div_floor(
            amount_out_before_fee,
            BPS_SCALE,
            to_remaining.saturating_add(amount_out_before_fee),
        );
    }
    withdrawal_pct_bps(to_remaining, amount_out_before_fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_bucket_charges_the_base_fee() {
        assert_eq!(fee_bps(7_000, 3_000, SWAP_BASE_FEE_BPS), 5);
        assert_eq!(fee_bps(7_000, 3_000, UNSTAKE_BASE_FEE_BPS), 30);
        assert_eq!(fee_bps(0, 0, SWAP_BASE_FEE_BPS), 5);
    }

    #[test]
    fn one_bps_over_a_threshold_jumps_the_fee() {
        // Utilization edge: 7_000 is healthy, 7_001 is not.
        assert_eq!(fee_bps(7_000, 3_000, SWAP_BASE_FEE_BPS), 5);
        assert_eq!(fee_bps(7_001, 3_000, SWAP_BASE_FEE_BPS), 4_000);
        // Withdrawal edge at fixed utilization.
        assert_eq!(fee_bps(5_000, 3_000, SWAP_BASE_FEE_BPS), 5);
        assert_eq!(fee_bps(5_000, 3_001, SWAP_BASE_FEE_BPS), 4_000);
    }

    #[test]
    fn utilization_buckets_escalate() {
        assert_eq!(fee_bps(8_000, 0, SWAP_BASE_FEE_BPS), 4_000);
        assert_eq!(fee_bps(8_001, 0, SWAP_BASE_FEE_BPS), 4_500);
        assert_eq!(fee_bps(9_000, 0, SWAP_BASE_FEE_BPS), 4_500);
        assert_eq!(fee_bps(9_001, 0, SWAP_BASE_FEE_BPS), 5_000);
        assert_eq!(fee_bps(10_000, 0, SWAP_BASE_FEE_BPS), 5_000);
    }

    #[test]
    fn huge_withdrawal_from_moderate_pool_hits_the_critical_bucket() {
        assert_eq!(fee_bps(7_500, 5_001, SWAP_BASE_FEE_BPS), 5_000);
        assert_eq!(fee_bps(7_500, 5_000, SWAP_BASE_FEE_BPS), 4_000);
        // Branch order: the withdrawal clause also catches low-utilization
        // trades that the healthy bucket already rejected.
        assert_eq!(fee_bps(6_000, 6_000, SWAP_BASE_FEE_BPS), 5_000);
    }

    #[test]
    fn tier_flips_at_the_healthy_edges() {
        assert_eq!(tier(7_000, 3_000), Tier::Healthy);
        assert_eq!(tier(7_001, 3_000), Tier::Unhealthy);
        assert_eq!(tier(7_000, 3_001), Tier::Unhealthy);
        assert_eq!(Tier::Healthy.as_u8(), 1);
        assert_eq!(Tier::Unhealthy.as_u8(), 2);
    }

    #[test]
    fn empty_destination_pool_is_fully_utilized() {
        assert_eq!(utilization_bps(0, 1), BPS_SCALE);
        assert_eq!(utilization_bps(0, 1_000_000_000), BPS_SCALE);
        // And the withdrawal fraction of an empty pool with no payout is 0.
        assert_eq!(withdrawal_pct_bps(0, 0), 0);
    }

    #[test]
    fn utilization_formula_branches() {
        // Payout exceeds remaining: floor(900 * 10_000 / 1_000) = 9_000.
        assert_eq!(utilization_bps(100, 900), 9_000);
        // Payout within remaining: equals the withdrawal fraction.
        assert_eq!(utilization_bps(900, 100), withdrawal_pct_bps(900, 100));
        assert_eq!(utilization_bps(900, 100), 1_000);
    }

    #[test]
    fn withdrawal_pct_truncates() {
        // floor(1 * 10_000 / 3) = 3_333.
        assert_eq!(withdrawal_pct_bps(2, 1), 3_333);
    }
}

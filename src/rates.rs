//! Exchange-rate math: base rate between two coins plus the depth penalty.
//!
//! Rates are fixed-point at 1e6: `rate` means "micro-units of the destination
//! per 1_000_000 base units of the source". The depth penalty marks the rate
//! down when the destination coin sits below its target basket share, which
//! prices scarcity into the quote before fees even apply.

use crate::valuation::{mul_div_floor, BPS_SCALE};

/// Fixed-point scale for exchange rates.
pub const RATE_SCALE: u64 = 1_000_000;

/// Base exchange rate from normalized prices.
///
/// Caller must have rejected unavailable prices already: `price_to == 0`
/// is a precondition violation, not a quotable state.
pub fn base_rate(price_from_micro_usd: u64, price_to_micro_usd: u64) -> u64 {
    mul_div_floor(price_from_micro_usd, RATE_SCALE, price_to_micro_usd)
}

/// Depth penalty in bps for a destination below its target share.
///
/// Zero when the destination has no target (the reference coin) or is at or
/// above target. With coverage >= 0 the formula tops out at 100 bps; the
/// explicit cap keeps the rate multiplier from ever wrapping regardless of
/// registry contents.
pub fn depth_penalty_bps(target_bps: u64, coverage_pre_bps: u64) -> u64 {
    if target_bps == 0 || coverage_pre_bps >= target_bps {
        return 0;
    }
    let shortfall = target_bps - coverage_pre_bps;
    mul_div_floor(shortfall, 100, target_bps).min(BPS_SCALE)
}

/// Apply a depth penalty to a base rate.
pub fn adjusted_rate(base_rate: u64, penalty_bps: u64) -> u64 {
    mul_div_floor(base_rate, BPS_SCALE - penalty_bps.min(BPS_SCALE), BPS_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_rate_is_price_ratio_at_rate_scale() {
        // $1.00 coin into a 19_000 micro-$ coin.
        assert_eq!(base_rate(1_000_000, 19_000), 52_631_578);
        // Equal prices quote 1:1.
        assert_eq!(base_rate(19_000, 19_000), 1_000_000);
        // Truncates, never rounds: 1_000_000 * 1e6 / 3 = 333_333_333_333.33..
        assert_eq!(base_rate(1_000_000, 3), 333_333_333_333);
    }

    #[test]
    fn penalty_scales_with_shortfall() {
        // A third below a 3_000 bps target: floor(1_000 * 100 / 3_000) = 33.
        assert_eq!(depth_penalty_bps(3_000, 2_000), 33);
        // Fully uncovered destination pays the full 100 bps markdown.
        assert_eq!(depth_penalty_bps(3_000, 0), 100);
        assert_eq!(depth_penalty_bps(2_500, 2_499), 0);
    }

    #[test]
    fn no_target_or_healthy_coverage_means_no_penalty() {
        assert_eq!(depth_penalty_bps(0, 0), 0);
        assert_eq!(depth_penalty_bps(3_000, 3_000), 0);
        assert_eq!(depth_penalty_bps(3_000, 9_500), 0);
    }

    #[test]
    fn adjusted_rate_marks_down_by_penalty() {
        let base = base_rate(1_000_000, 19_000);
        let penalty = depth_penalty_bps(3_000, 2_000);
        // floor(52_631_578 * 9_967 / 10_000)
        assert_eq!(adjusted_rate(base, penalty), 52_457_893);
        assert_eq!(adjusted_rate(base, 0), base);
    }

    #[test]
    fn pathological_penalty_cannot_wrap_the_multiplier() {
        assert_eq!(adjusted_rate(1_000_000, 10_000), 0);
        assert_eq!(adjusted_rate(1_000_000, 99_999), 0);
    }
}

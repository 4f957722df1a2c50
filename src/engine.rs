//! Core quote math for the basket quoter.
//!
//! We keep this file focused on:
//! - the trade simulation (rate, projection, fee, payout)
//! - composing the quote result with its audit metadata
//!
//! Anything that touches the network is delegated:
//! - ledger snapshot fetching lives in `ledger.rs`
//! - feed fetching/normalization policy lives in `oracle/feed.rs`
//!
//! The simulation must land on the settlement ledger's numbers to the unit.
//! Two things make that work and both are deliberate:
//! - every multiply-then-divide goes through `valuation::mul_div_floor`
//! - the fee path runs on the registry's cached prices while the rate path
//!   runs on the quoted (possibly fresher) prices, because that is the split
//!   the ledger itself executes with.

use crate::currency::Currency;
use crate::fees;
use crate::ledger::LedgerSnapshot;
use crate::metrics;
use crate::oracle::feed;
use crate::pricing::Prices;
use crate::rates;
use crate::state::AppState;
use crate::types::{FeeBreakdown, QuoteError, QuoteMeta, QuoteResult};
use crate::valuation::{self, mul_div_floor, BPS_SCALE};
use std::time::Instant;

/// Which payout operation is being quoted. Determines the source side of the
/// trade and the healthy-tier base fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Swap { from: Currency },
    Unstake,
}

impl Op {
    /// The currency whose price prices the source side. The basket share is
    /// dollar-denominated, so an unstake prices its source at the reference
    /// coin.
    fn source(self) -> Currency {
        match self {
            Op::Swap { from } => from,
            Op::Unstake => Currency::Usdc,
        }
    }

    fn base_fee_bps(self) -> u64 {
        match self {
            Op::Swap { .. } => fees::SWAP_BASE_FEE_BPS,
            Op::Unstake => fees::UNSTAKE_BASE_FEE_BPS,
        }
    }
}

/// Simulate one trade against a consistent snapshot. Pure; no I/O.
///
/// `live` carries the normalized prices the quote is displayed and rated
/// with; the snapshot's registry carries the cached prices the fee-side
/// valuation must use.
pub fn simulate(
    op: Op,
    to: Currency,
    amount_in: u64,
    live: &Prices,
    snap: &LedgerSnapshot,
) -> Result<QuoteResult, QuoteError> {
    if amount_in == 0 {
        return Err(QuoteError::InvalidInput("amount_in must be > 0".into()));
    }
    if let Op::Swap { from } = op {
        if from == to {
            return Err(QuoteError::UnsupportedPair(format!(
                "{from} -> {to} is not a trade"
            )));
        }
    }

    // 1. Both legs must be priceable; a zero never flows into rate math.
    let source = op.source();
    let from_price = live.get(source);
    if from_price == 0 {
        return Err(QuoteError::PriceUnavailable(source.code().into()));
    }
    let to_price = live.get(to);
    if to_price == 0 {
        return Err(QuoteError::PriceUnavailable(to.code().into()));
    }

    // 2.-4. Pre-trade coverage (quoted prices) feeds the depth-adjusted rate.
    let pre = valuation::value_basket(&snap.pool, live);
    let to_coverage_bps_pre = pre.coverage_bps(to);
    let base_rate = rates::base_rate(from_price, to_price);
    let depth_penalty_bps =
        rates::depth_penalty_bps(snap.registry.target_bps(to), to_coverage_bps_pre);
    let rate = rates::adjusted_rate(base_rate, depth_penalty_bps);

    let amount_out_before_fee = mul_div_floor(amount_in, rate, rates::RATE_SCALE);

    // 5. Project post-trade balances. Only a regional source adds liability;
    // a reference-coin source grows the reserve; an unstake burns share
    // outside the pool. The destination saturates at zero (balances are
    // non-negative by pool invariant).
    let mut post_pool = snap.pool;
    if let Op::Swap { from } = op {
        let grown = post_pool
            .balance(from)
            .checked_add(amount_in)
            .ok_or_else(|| QuoteError::InvalidInput("amount_in overflows pool balance".into()))?;
        post_pool.set_balance(from, grown);
    }
    let to_balance_pre = snap.pool.balance(to);
    let to_balance_post = to_balance_pre.saturating_sub(amount_out_before_fee);
    post_pool.set_balance(to, to_balance_post);

    // 6. Post-trade valuation runs on the registry's CACHED prices, not the
    // quoted ones. The ledger's fee decision is defined over its own cache;
    // pricing this step "consistently" would make quotes drift from it.
    let cached = snap.registry.cached_prices();
    let post = valuation::value_basket(&post_pool, &cached);
    let to_coverage_bps_post = post.coverage_bps(to);

    // 7.-8. Utilization and the withdrawal fraction key on the PRE-trade
    // destination balance. This baseline differs from step 6 on purpose; see
    // the module docs.
    let utilization_bps = fees::utilization_bps(to_balance_pre, amount_out_before_fee);
    let withdrawal_pct_bps = fees::withdrawal_pct_bps(to_balance_pre, amount_out_before_fee);
    let fee_bps = fees::fee_bps(utilization_bps, withdrawal_pct_bps, op.base_fee_bps());
    let tier = fees::tier(utilization_bps, withdrawal_pct_bps);

    // 9.-10. Final payout and fee mark-to-dollar.
    let amount_out = mul_div_floor(amount_out_before_fee, BPS_SCALE - fee_bps, BPS_SCALE);
    let fee_amount = amount_out_before_fee - amount_out;
    let fee_usd_micro = valuation::value_of(fee_amount, to_price);

    let (from_balance_pre, from_balance_post) = match op {
        Op::Swap { from } => (
            Some(snap.pool.balance(from)),
            Some(post_pool.balance(from)),
        ),
        Op::Unstake => (None, None),
    };

    Ok(QuoteResult {
        amount_out,
        rate,
        fee_bps,
        fee_percent: fee_bps as f64 / 100.0,
        fee_usd_micro,
        tier: tier.as_u8(),
        from_price_micro_usd: from_price,
        to_price_micro_usd: to_price,
        meta: QuoteMeta {
            base_rate,
            depth_penalty_bps,
            amount_out_before_fee,
            utilization_bps,
            withdrawal_pct_bps,
            to_coverage_bps_pre,
            to_coverage_bps_post,
            from_balance_pre,
            from_balance_post,
            to_balance_pre,
            to_balance_post,
            snapshot_version: snap.version,
        },
    })
}

/// Flat deposit fee. No pool state involved; the price is display-only.
pub fn stake_fee(currency: Currency, amount_in: u64, live: &Prices) -> Result<FeeBreakdown, QuoteError> {
    if amount_in == 0 {
        return Err(QuoteError::InvalidInput("amount_in must be > 0".into()));
    }
    let price = live.get(currency);
    if price == 0 {
        return Err(QuoteError::PriceUnavailable(currency.code().into()));
    }
    let fee_amount = mul_div_floor(amount_in, fees::STAKE_FEE_BPS, BPS_SCALE);
    Ok(FeeBreakdown {
        amount_in,
        fee_bps: fees::STAKE_FEE_BPS,
        fee_percent: fees::STAKE_FEE_BPS as f64 / 100.0,
        fee_amount,
        fee_usd_micro: valuation::value_of(fee_amount, price),
        amount_after_fee: amount_in - fee_amount,
        price_micro_usd: price,
    })
}

/// Fetch a consistent snapshot plus live prices, then simulate.
///
/// The snapshot and the feed are independent collaborators, so the two
/// fetches run concurrently. All blocking I/O happens here, once, before the
/// pure simulation runs.
async fn fetch_and_simulate(
    st: &AppState,
    op: Op,
    to: Currency,
    amount_in: u64,
) -> Result<QuoteResult, QuoteError> {
    let snap_fetch = async {
        let t0 = Instant::now();
        let r = st.ledger.fetch_state().await;
        (r, t0.elapsed().as_millis())
    };
    let price_fetch = async {
        let t0 = Instant::now();
        let p = feed::live_prices(&st.http, &st.cfg.feed_url, st.cfg.feed_max_staleness_secs).await;
        (p, t0.elapsed().as_millis())
    };
    let ((snap_res, ledger_ms), (live, feed_ms)) = tokio::join!(snap_fetch, price_fetch);
    metrics::metrics().ledger_fetch_ms.observe(ledger_ms as f64);
    metrics::metrics().feed_fetch_ms.observe(feed_ms as f64);
    let snap = snap_res?;

    let t0 = Instant::now();
    let out = simulate(op, to, amount_in, &live, &snap);
    metrics::metrics()
        .quote_compute_ms
        .observe(t0.elapsed().as_millis() as f64);
    out
}

pub async fn quote_swap(
    st: &AppState,
    from: Currency,
    to: Currency,
    amount_in: u64,
) -> Result<QuoteResult, QuoteError> {
    fetch_and_simulate(st, Op::Swap { from }, to, amount_in).await
}

pub async fn quote_unstake(
    st: &AppState,
    to: Currency,
    amount_in: u64,
) -> Result<QuoteResult, QuoteError> {
    fetch_and_simulate(st, Op::Unstake, to, amount_in).await
}

pub async fn quote_stake_fee(
    st: &AppState,
    currency: Currency,
    amount_in: u64,
) -> Result<FeeBreakdown, QuoteError> {
    let t0 = Instant::now();
    let live = feed::live_prices(&st.http, &st.cfg.feed_url, st.cfg.feed_max_staleness_secs).await;
    metrics::metrics()
        .feed_fetch_ms
        .observe(t0.elapsed().as_millis() as f64);
    stake_fee(currency, amount_in, &live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{PoolState, RegionalValues, RegistryState};
    use crate::pricing::MICRO_USD;

    fn registry() -> RegistryState {
        RegistryState {
            target_bps: RegionalValues {
                chfx: 3_000,
                tryb: 3_000,
                sekx: 2_000,
            },
            cached_price_micro_usd: RegionalValues {
                chfx: 1_130_000,
                tryb: 19_000,
                sekx: 95_000,
            },
        }
    }

    fn live() -> Prices {
        Prices::default()
            .with(Currency::Usdc, MICRO_USD)
            .with(Currency::Chfx, 1_130_000)
            .with(Currency::Tryb, 19_000)
            .with(Currency::Sekx, 95_000)
    }

    fn snapshot(pool: PoolState) -> LedgerSnapshot {
        LedgerSnapshot {
            version: 42,
            pool,
            registry: registry(),
        }
    }

    fn pool(usdc: u64, chfx: u64, tryb: u64, sekx: u64) -> PoolState {
        PoolState {
            usdc_reserve: usdc,
            chfx_liability: chfx,
            tryb_liability: tryb,
            sekx_liability: sekx,
        }
    }

    #[test]
    fn depth_penalized_swap_into_scarce_destination() {
        // TRYB covers 2_000 bps of a 10_000 micro-$ basket against a 3_000
        // bps target, so the rate is marked down 33 bps before fees.
        let snap = snapshot(pool(8_000, 0, 105_264, 0));
        let q = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Tryb,
            1_000_000,
            &live(),
            &snap,
        )
        .unwrap();

        assert_eq!(q.meta.to_coverage_bps_pre, 2_000);
        assert_eq!(q.meta.base_rate, 52_631_578);
        assert_eq!(q.meta.depth_penalty_bps, 33);
        assert_eq!(q.rate, 52_457_893);
        assert_eq!(q.meta.amount_out_before_fee, 52_457_893);

        // The payout dwarfs the 105_264-unit pool: utilization lands in the
        // critical bucket and the projected liability bottoms out at zero.
        assert_eq!(q.meta.utilization_bps, 9_979);
        assert_eq!(q.fee_bps, 5_000);
        assert_eq!(q.tier, 2);
        assert_eq!(q.amount_out, 26_228_946);
        assert_eq!(q.fee_usd_micro, 498_349);
        assert_eq!(q.meta.to_balance_post, 0);
        assert_eq!(q.meta.from_balance_post, Some(1_008_000));
        assert_eq!(q.meta.snapshot_version, 42);
    }

    #[test]
    fn healthy_swap_charges_five_bps() {
        // SEKX sits above its 2_000 bps target; a $1_000 swap barely moves a
        // $38k pool, so the quote stays in the healthy bucket.
        let snap = snapshot(pool(62_000_000_000, 0, 0, 400_000_000_000));
        let q = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Sekx,
            1_000_000_000,
            &live(),
            &snap,
        )
        .unwrap();

        assert_eq!(q.meta.to_coverage_bps_pre, 3_800);
        assert_eq!(q.meta.depth_penalty_bps, 0);
        assert_eq!(q.meta.base_rate, 10_526_315);
        assert_eq!(q.meta.amount_out_before_fee, 10_526_315_000);
        assert_eq!(q.meta.utilization_bps, 256);
        assert_eq!(q.meta.withdrawal_pct_bps, 256);
        assert_eq!(q.fee_bps, fees::SWAP_BASE_FEE_BPS);
        assert_eq!(q.tier, 1);
        assert_eq!(q.amount_out, 10_521_051_842);
        assert_eq!(q.fee_usd_micro, 500_000);
    }

    #[test]
    fn empty_destination_pool_quotes_the_critical_fee() {
        let snap = snapshot(pool(1_000_000_000, 0, 0, 0));
        let q = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Chfx,
            1_000_000,
            &live(),
            &snap,
        )
        .unwrap();
        assert_eq!(q.meta.utilization_bps, BPS_SCALE);
        assert_eq!(q.fee_bps, 5_000);
        assert_eq!(q.tier, 2);
    }

    #[test]
    fn unstake_prices_the_source_at_the_reference_coin() {
        // CHFX covers 4_747 bps of the basket against a 3_000 bps target:
        // no depth penalty, healthy utilization, 30 bps unstake fee.
        let snap = snapshot(pool(50_000_000_000, 40_000_000_000, 0, 0));
        let prices = live().with(Currency::Usdc, 999_900);
        let q = simulate(Op::Unstake, Currency::Chfx, 1_000_000, &prices, &snap).unwrap();

        assert_eq!(q.from_price_micro_usd, 999_900);
        assert_eq!(q.meta.to_coverage_bps_pre, 4_747);
        assert_eq!(q.meta.depth_penalty_bps, 0);
        assert_eq!(q.meta.base_rate, 884_867);
        assert_eq!(q.meta.amount_out_before_fee, 884_867);
        assert_eq!(q.fee_bps, fees::UNSTAKE_BASE_FEE_BPS);
        assert_eq!(q.amount_out, 882_212);
        // Unstakes burn share outside the pool: no source balance to project.
        assert_eq!(q.meta.from_balance_pre, None);
        assert_eq!(q.meta.from_balance_post, None);
        assert_eq!(q.meta.to_balance_post, 40_000_000_000 - 884_867);
    }

    #[test]
    fn fee_side_valuation_uses_the_cached_registry_prices() {
        // Live TRYB is 19_000 but the registry cache still says 38_000. The
        // post-trade coverage must come out of the cache; repricing it with
        // the live number would diverge from the ledger.
        let mut reg = registry();
        reg.cached_price_micro_usd.tryb = 38_000;
        let snap = LedgerSnapshot {
            version: 1,
            pool: pool(50_000_000, 0, 1_000_000_000, 0),
            registry: reg,
        };
        let q = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Tryb,
            100_000,
            &live(),
            &snap,
        )
        .unwrap();

        // Rate path still runs on live prices.
        assert_eq!(q.meta.to_coverage_bps_pre, 2_753);
        assert_eq!(q.meta.depth_penalty_bps, 8);
        assert_eq!(q.rate, 52_589_472);
        assert_eq!(q.meta.amount_out_before_fee, 5_258_947);

        // Cached-price projection: 4_300 bps, not the 2_739 the live price
        // would produce.
        assert_eq!(q.meta.to_coverage_bps_post, 4_300);

        // ...and the fee keys on pre-trade utilization, not on coverage.
        assert_eq!(q.meta.utilization_bps, 52);
        assert_eq!(q.fee_bps, fees::SWAP_BASE_FEE_BPS);
        assert_eq!(q.amount_out, 5_256_317);
    }

    #[test]
    fn unavailable_price_rejects_the_whole_quote() {
        let snap = snapshot(pool(1_000_000_000, 1_000_000_000, 1_000_000_000, 0));
        let no_tryb = live().with(Currency::Tryb, 0);
        let err = simulate(
            Op::Swap {
                from: Currency::Chfx,
            },
            Currency::Tryb,
            1_000_000,
            &no_tryb,
            &snap,
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::PriceUnavailable(ref c) if c == "TRYB"));

        // Source leg too, and unstakes depend on the reference price.
        let no_usdc = live().with(Currency::Usdc, 0);
        let err = simulate(Op::Unstake, Currency::Chfx, 1_000_000, &no_usdc, &snap).unwrap_err();
        assert!(matches!(err, QuoteError::PriceUnavailable(ref c) if c == "USDC"));
    }

    #[test]
    fn same_currency_swap_is_unsupported() {
        let snap = snapshot(pool(1_000_000, 0, 0, 0));
        let err = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Usdc,
            1_000_000,
            &live(),
            &snap,
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::UnsupportedPair(_)));
    }

    #[test]
    fn round_trip_never_creates_value() {
        let snap = snapshot(pool(
            100_000_000_000,
            30_000_000_000,
            500_000_000_000,
            200_000_000_000,
        ));
        for amount_in in [1u64, 1_000, 1_000_000, 5_000_000_000, 80_000_000_000] {
            let there = simulate(
                Op::Swap {
                    from: Currency::Tryb,
                },
                Currency::Chfx,
                amount_in,
                &live(),
                &snap,
            )
            .unwrap();
            if there.amount_out == 0 {
                continue;
            }
            let back = simulate(
                Op::Swap {
                    from: Currency::Chfx,
                },
                Currency::Tryb,
                there.amount_out,
                &live(),
                &snap,
            )
            .unwrap();
            assert!(
                back.amount_out <= amount_in,
                "round trip gained value: {} -> {} -> {}",
                amount_in,
                there.amount_out,
                back.amount_out
            );
        }
    }

    #[test]
    fn payout_is_not_monotonic_across_a_tier_boundary() {
        // SEKX pool of 1e9 base units, well above its target share. A $38
        // trade withdraws 2_857 bps (healthy, 5 bps fee); a $48 trade
        // withdraws 3_356 bps and jumps to the 4_000 bps bucket, so the
        // larger input pays out visibly less.
        let snap = snapshot(pool(100_000_000, 0, 0, 1_000_000_000));
        let small = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Sekx,
            38_000_000,
            &live(),
            &snap,
        )
        .unwrap();
        assert_eq!(small.meta.amount_out_before_fee, 399_999_970);
        assert_eq!(small.meta.withdrawal_pct_bps, 2_857);
        assert_eq!(small.fee_bps, fees::SWAP_BASE_FEE_BPS);
        assert_eq!(small.amount_out, 399_799_970);

        let big = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Sekx,
            48_000_000,
            &live(),
            &snap,
        )
        .unwrap();
        assert_eq!(big.meta.amount_out_before_fee, 505_263_120);
        assert_eq!(big.meta.withdrawal_pct_bps, 3_356);
        assert_eq!(big.fee_bps, 4_000);
        assert_eq!(big.tier, 2);
        assert_eq!(big.amount_out, 303_157_872);

        assert!(big.amount_out < small.amount_out);
    }

    #[test]
    fn stake_fee_is_flat_ten_bps() {
        let fb = stake_fee(Currency::Tryb, 1_000_000, &live()).unwrap();
        assert_eq!(fb.fee_bps, fees::STAKE_FEE_BPS);
        assert_eq!(fb.fee_amount, 1_000);
        assert_eq!(fb.amount_after_fee, 999_000);
        // 1_000 base units at 19_000 micro-$/unit = 19 micro-$.
        assert_eq!(fb.fee_usd_micro, 19);
        assert_eq!(fb.price_micro_usd, 19_000);

        let err = stake_fee(Currency::Tryb, 1_000_000, &Prices::default()).unwrap_err();
        assert!(matches!(err, QuoteError::PriceUnavailable(_)));
        let err = stake_fee(Currency::Tryb, 0, &live()).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidInput(_)));
    }

    #[test]
    fn zero_amount_is_rejected_before_any_math() {
        let snap = snapshot(pool(1_000_000, 0, 0, 0));
        let err = simulate(
            Op::Swap {
                from: Currency::Usdc,
            },
            Currency::Tryb,
            0,
            &live(),
            &snap,
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidInput(_)));
    }
}

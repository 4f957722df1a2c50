//! API types + error taxonomy.
//!
//! We separate these from `engine.rs` so the handlers stay readable.

use serde::{Deserialize, Serialize};

const MAX_CURRENCY_CODE_LEN: usize = 16;

fn ensure_len_le(field: &str, s: &str, max: usize) -> Result<(), AppError> {
    if s.len() > max {
        return Err(AppError::BadRequest(format!(
            "{field} too long: {} chars (max {max})",
            s.len()
        )));
    }
    Ok(())
}

/// Engine-level failure taxonomy.
///
/// Every variant except `InvalidInput` is recoverable by re-fetching and
/// re-quoting; none of them are fatal to the host process.
#[derive(thiserror::Error, Debug)]
pub enum QuoteError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A required price could not be normalized to a non-zero value. The
    /// whole quote is rejected; a zero price never flows downstream.
    #[error("price unavailable: {0}")]
    PriceUnavailable(String),
    /// Pool or registry snapshot could not be obtained from the ledger.
    #[error("pool state unavailable: {0}")]
    PoolStateUnavailable(String),
    #[error("unsupported currency pair: {0}")]
    UnsupportedPair(String),
}

/// Transport-level error for the HTTP surface.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
}

impl AppError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            AppError::BadRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => axum::http::StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            AppError::TooManyRequests(_) => axum::http::StatusCode::TOO_MANY_REQUESTS,
            AppError::BadGateway(_) => axum::http::StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(e: QuoteError) -> Self {
        match e {
            QuoteError::InvalidInput(m) => AppError::BadRequest(format!("invalid input: {m}")),
            QuoteError::UnsupportedPair(m) => {
                AppError::BadRequest(format!("unsupported currency pair: {m}"))
            }
            QuoteError::PriceUnavailable(m) => {
                AppError::Unavailable(format!("price unavailable: {m}"))
            }
            QuoteError::PoolStateUnavailable(m) => {
                AppError::BadGateway(format!("pool state unavailable: {m}"))
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiResult<T> = Result<axum::Json<T>, (axum::http::StatusCode, axum::Json<ErrorBody>)>;

pub fn api_err<T>(e: AppError) -> ApiResult<T> {
    Err((
        e.status_code(),
        axum::Json(ErrorBody {
            error: e.to_string(),
        }),
    ))
}

#[derive(Deserialize, Debug)]
pub struct SwapQuoteRequest {
    /// Source currency code (e.g. "USDC", "TRYB").
    pub from: String,
    /// Destination currency code.
    pub to: String,
    /// Amount in base units (6 decimals).
    pub amount_in: u64,
}

impl SwapQuoteRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        ensure_len_le("from", self.from.trim(), MAX_CURRENCY_CODE_LEN)?;
        ensure_len_le("to", self.to.trim(), MAX_CURRENCY_CODE_LEN)?;
        if self.amount_in == 0 {
            return Err(AppError::BadRequest("amount_in must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct UnstakeQuoteRequest {
    /// Destination currency code; the source side is the basket share.
    pub to: String,
    /// Amount of basket share to unstake, base units (6 decimals).
    pub amount_in: u64,
}

impl UnstakeQuoteRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        ensure_len_le("to", self.to.trim(), MAX_CURRENCY_CODE_LEN)?;
        if self.amount_in == 0 {
            return Err(AppError::BadRequest("amount_in must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct StakeFeeRequest {
    /// Currency being deposited.
    pub currency: String,
    /// Amount in base units (6 decimals).
    pub amount_in: u64,
}

impl StakeFeeRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        ensure_len_le("currency", self.currency.trim(), MAX_CURRENCY_CODE_LEN)?;
        if self.amount_in == 0 {
            return Err(AppError::BadRequest("amount_in must be > 0".into()));
        }
        Ok(())
    }
}

/// A full quote. Authoritative fields are exact integers; the ledger must be
/// able to reproduce `amount_out` to the unit from the echoed prices.
#[derive(Serialize, Debug, Clone)]
pub struct QuoteResult {
    /// Final payout in destination base units, after the fee.
    pub amount_out: u64,
    /// Depth-adjusted exchange rate, fixed-point at 1e6.
    pub rate: u64,
    pub fee_bps: u64,
    /// Display-only percentage (`fee_bps / 100`).
    pub fee_percent: f64,
    /// Fee marked to dollars at the quoted destination price, micro-dollars.
    pub fee_usd_micro: u64,
    /// 1 = healthy, 2 = unhealthy/high-fee.
    pub tier: u8,
    /// Exact prices this quote was computed with. A settlement call built
    /// from these inputs lands on the same numbers.
    pub from_price_micro_usd: u64,
    pub to_price_micro_usd: u64,
    pub meta: QuoteMeta,
}

/// Intermediate values for audit/display; everything a reviewer needs to
/// re-derive the quote by hand.
#[derive(Serialize, Debug, Clone)]
pub struct QuoteMeta {
    pub base_rate: u64,
    pub depth_penalty_bps: u64,
    pub amount_out_before_fee: u64,
    pub utilization_bps: u64,
    pub withdrawal_pct_bps: u64,
    /// Destination coverage before the trade, live prices.
    pub to_coverage_bps_pre: u64,
    /// Destination coverage after the projected trade, at the registry's
    /// cached prices (the ledger's own baseline). Audit-only: the fee
    /// decision keys on utilization, not on this number.
    pub to_coverage_bps_post: u64,
    pub from_balance_pre: Option<u64>,
    pub from_balance_post: Option<u64>,
    pub to_balance_pre: u64,
    pub to_balance_post: u64,
    /// Ledger snapshot version the projection ran against.
    pub snapshot_version: u64,
}

/// Flat-fee breakdown for deposits. No tiering.
#[derive(Serialize, Debug, Clone)]
pub struct FeeBreakdown {
    pub amount_in: u64,
    pub fee_bps: u64,
    pub fee_percent: f64,
    /// Fee in the deposited currency's base units.
    pub fee_amount: u64,
    pub fee_usd_micro: u64,
    pub amount_after_fee: u64,
    pub price_micro_usd: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_reject_zero_amounts() {
        let r = SwapQuoteRequest {
            from: "USDC".into(),
            to: "TRYB".into(),
            amount_in: 0,
        };
        assert!(r.validate().is_err());
        let r = UnstakeQuoteRequest {
            to: "CHFX".into(),
            amount_in: 0,
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn oversized_codes_are_rejected_before_parsing() {
        let r = SwapQuoteRequest {
            from: "X".repeat(64),
            to: "TRYB".into(),
            amount_in: 1,
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn engine_errors_map_to_stable_status_codes() {
        use axum::http::StatusCode;
        let cases: [(QuoteError, StatusCode); 4] = [
            (
                QuoteError::InvalidInput("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                QuoteError::UnsupportedPair("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                QuoteError::PriceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                QuoteError::PoolStateUnavailable("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (e, code) in cases {
            assert_eq!(AppError::from(e).status_code(), code);
        }
    }
}

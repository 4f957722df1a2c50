//! Currency registry for the basket.
//!
//! The basket holds one reference dollar coin (USDC, the pool's reserve asset)
//! and N regional coins, each carrying a liability balance, a policy target
//! share and a ledger-cached price. Everything downstream iterates over
//! [`Currency::REGIONALS`], so listing a new coin is a data change here plus a
//! row in the ledger state types.

use serde::{Deserialize, Serialize};

/// All balances and amounts are integer base units at 6 decimals.
pub const UNIT_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Reference dollar coin. Backs the basket as a reserve; has no
    /// liability balance and no target share.
    Usdc,
    /// CHF-pegged regional coin.
    Chfx,
    /// TRY-pegged regional coin.
    Tryb,
    /// SEK-pegged regional coin.
    Sekx,
}

impl Currency {
    pub const ALL: [Currency; 4] = [
        Currency::Usdc,
        Currency::Chfx,
        Currency::Tryb,
        Currency::Sekx,
    ];

    /// The regional (liability-bearing) subset, in registry order.
    pub const REGIONALS: [Currency; 3] = [Currency::Chfx, Currency::Tryb, Currency::Sekx];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usdc => "USDC",
            Currency::Chfx => "CHFX",
            Currency::Tryb => "TRYB",
            Currency::Sekx => "SEKX",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "USDC" => Some(Currency::Usdc),
            "CHFX" => Some(Currency::Chfx),
            "TRYB" => Some(Currency::Tryb),
            "SEKX" => Some(Currency::Sekx),
            _ => None,
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Currency::Usdc)
    }

    /// Feed pair symbol for this currency.
    ///
    /// Conventions differ per side of the slash (see `pricing`):
    /// - `USDC/USD` is quoted as dollars per coin.
    /// - `USD/XXX` pairs are quoted as foreign units per dollar, so the
    ///   normalizer inverts them.
    pub fn feed_pair(self) -> &'static str {
        match self {
            Currency::Usdc => "USDC/USD",
            Currency::Chfx => "USD/CHF",
            Currency::Tryb => "USD/TRY",
            Currency::Sekx => "USD/SEK",
        }
    }

    /// Dense index for array-backed per-currency tables.
    pub fn idx(self) -> usize {
        match self {
            Currency::Usdc => 0,
            Currency::Chfx => 1,
            Currency::Tryb => 2,
            Currency::Sekx => 3,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

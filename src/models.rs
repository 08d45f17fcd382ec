use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Hyperliquid,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 3] = [
        ExchangeId::Binance,
        ExchangeId::Bybit,
        ExchangeId::Hyperliquid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Hyperliquid => "hyperliquid",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized funding-rate observation. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingRecord {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub funding_time_ms: i64,
    pub funding_time_iso: String,
    pub funding_rate: String,
}

impl FundingRecord {
    /// Builds a record, deriving the ISO column from `funding_time_ms`.
    /// Returns `None` for timestamps chrono cannot represent.
    pub fn new(
        exchange: ExchangeId,
        symbol: &str,
        funding_time_ms: i64,
        funding_rate: String,
    ) -> Option<Self> {
        let funding_time_iso = timestamp::iso_from_ms(funding_time_ms)?;
        Some(Self {
            exchange,
            symbol: symbol.to_string(),
            funding_time_ms,
            funding_time_iso,
            funding_rate,
        })
    }
}

/// Duplicate timestamps dropped by [`sort_and_dedup`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub dropped: usize,
    /// Dropped rows whose rate differed from the row that was kept.
    pub conflicting: usize,
}

/// Sorts ascending by funding time and keeps the first row seen for each
/// timestamp. The sort is stable, so "first" means first in input order.
pub fn sort_and_dedup(records: &mut Vec<FundingRecord>) -> DedupStats {
    records.sort_by_key(|r| r.funding_time_ms);

    let mut stats = DedupStats::default();
    records.dedup_by(|later, kept| {
        if later.funding_time_ms != kept.funding_time_ms {
            return false;
        }
        stats.dropped += 1;
        if later.funding_rate != kept.funding_rate {
            stats.conflicting += 1;
        }
        true
    });
    stats
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use chrono::{NaiveDate, NaiveTime};
use clap::Parser;

use crate::exchanges::{binance, bybit, hyperliquid};
use crate::models::ExchangeId;
use crate::timestamp::DAY_MS;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "funding-history",
    version,
    about = "Fetch historical perpetual funding rates from Binance, Bybit and Hyperliquid into CSV files"
)]
pub struct Config {
    /// Directory holding the per-exchange symbol list files
    #[arg(long, env = "SYMBOLS_DIR", default_value = "./symbols")]
    pub symbols_dir: PathBuf,

    /// Directory the CSV files are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Exchanges to fetch, comma-separated
    #[arg(
        long = "exchange",
        env = "EXCHANGES",
        value_enum,
        value_delimiter = ',',
        default_values_t = ExchangeId::ALL
    )]
    pub exchanges: Vec<ExchangeId>,

    /// Symbols to fetch on every selected exchange instead of the symbol files
    #[arg(long, env = "SYMBOLS", value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Look back this many days from now. Takes precedence over --start-date
    #[arg(long, env = "FETCH_DAYS")]
    pub days: Option<u32>,

    /// First day to fetch (UTC midnight) when --days is not given
    #[arg(long, env = "START_DATE", default_value = "2024-12-16")]
    pub start_date: NaiveDate,

    /// Delay between page requests in milliseconds, overriding each exchange's default
    #[arg(long, env = "PAGE_DELAY_MS")]
    pub page_delay_ms: Option<u64>,

    #[arg(long, env = "BINANCE_API_URL", default_value = binance::DEFAULT_BASE_URL)]
    pub binance_url: String,

    #[arg(long, env = "BYBIT_API_URL", default_value = bybit::DEFAULT_BASE_URL)]
    pub bybit_url: String,

    #[arg(long, env = "HYPERLIQUID_API_URL", default_value = hyperliquid::DEFAULT_BASE_URL)]
    pub hyperliquid_url: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Loads `.env` (if any), then parses flags with environment fallbacks.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// The closed fetch window `[start_ms, now_ms]`.
    pub fn window(&self, now_ms: i64) -> Result<(i64, i64)> {
        let start_ms = match self.days {
            Some(days) => now_ms - i64::from(days) * DAY_MS,
            None => self
                .start_date
                .and_time(NaiveTime::MIN)
                .and_utc()
                .timestamp_millis(),
        };
        ensure!(
            start_ms <= now_ms,
            "fetch window starts after it ends ({start_ms} > {now_ms})"
        );
        Ok((start_ms, now_ms))
    }

    pub fn page_delay(&self) -> Option<Duration> {
        self.page_delay_ms.map(Duration::from_millis)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::errors::ExchangeError;
use crate::fetcher::fields::EntrySchema;
use crate::models::ExchangeId;

pub mod binance;
pub mod bybit;
pub mod hyperliquid;

/// Which end of the window the cursor starts at and which way it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Cursor starts at the window start and moves later.
    Forward,
    /// Cursor starts at the window end and moves earlier; pages arrive newest first.
    Backward,
}

/// Everything the pagination loop needs to know about an exchange's
/// history endpoint besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct PageProfile {
    pub direction: Direction,
    /// Fixed page size. `None` means the endpoint takes no limit and a
    /// window only ends on an empty page or when the cursor leaves it.
    pub page_limit: Option<usize>,
    /// Splits the fetch range into windows of this length before paginating.
    pub window_ms: Option<i64>,
    pub page_delay: Duration,
    pub timeout: Duration,
    pub schema: EntrySchema,
}

/// Bounds and size of one page request, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub start_ms: i64,
    pub end_ms: i64,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait Exchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    fn profile(&self) -> &PageProfile;

    /// Symbol list files, relative to the symbols directory, read for this exchange.
    fn symbol_files(&self) -> &'static [&'static str];

    /// Issues one history request and returns the raw entries in the order
    /// the exchange sent them. An empty vec means the range has no data;
    /// any response without a recognizable entry list is an error.
    async fn fetch_page(
        &self,
        symbol: &str,
        page: PageRequest,
    ) -> Result<Vec<Value>, ExchangeError>;
}

/// Builds the adapter for `id` against the base URL configured for it.
pub fn build(id: ExchangeId, config: &Config) -> Box<dyn Exchange> {
    match id {
        ExchangeId::Binance => Box::new(binance::Binance::new(&config.binance_url)),
        ExchangeId::Bybit => Box::new(bybit::Bybit::new(&config.bybit_url)),
        ExchangeId::Hyperliquid => Box::new(hyperliquid::Hyperliquid::new(&config.hyperliquid_url)),
    }
}

/// Reads the body as JSON after rejecting non-2xx statuses.
async fn json_body(response: reqwest::Response) -> Result<Value, ExchangeError> {
    let text = response.error_for_status()?.text().await?;
    Ok(serde_json::from_str(&text)?)
}

fn expect_array(body: Value, what: &str) -> Result<Vec<Value>, ExchangeError> {
    match body {
        Value::Array(entries) => Ok(entries),
        other => Err(ExchangeError::UnexpectedData(format!(
            "{what}: expected a JSON array, got {}",
            truncate(&other.to_string(), 200)
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

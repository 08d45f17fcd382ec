use std::time::Duration;

use super::{Direction, Exchange, PageProfile, PageRequest};
use crate::errors::ExchangeError;
use crate::fetcher::fields::{EntrySchema, FieldCandidates};
use crate::models::ExchangeId;
use crate::timestamp::DAY_MS;
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.hyperliquid.xyz";

const INFO_PATH: &str = "/info";

// fundingHistory takes no limit; long ranges are cut into 30 day windows.
const PROFILE: PageProfile = PageProfile {
    direction: Direction::Forward,
    page_limit: None,
    window_ms: Some(30 * DAY_MS),
    page_delay: Duration::from_millis(500),
    timeout: Duration::from_secs(30),
    schema: EntrySchema {
        rate: FieldCandidates(&["fundingRate", "funding_rate", "rate", "funding"]),
        time: FieldCandidates(&["time", "timestamp", "t"]),
    },
};

pub struct Hyperliquid {
    client: reqwest::Client,
    base_url: String,
}

impl Hyperliquid {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Hyperliquid names perps by coin: `ETHUSDC` -> `ETH`. Symbols that do not
/// start with a letter are sent unchanged.
pub fn coin_from_symbol(symbol: &str) -> &str {
    let end = symbol
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(symbol.len(), |(idx, _)| idx);

    if end == 0 { symbol } else { &symbol[..end] }
}

#[async_trait]
impl Exchange for Hyperliquid {
    fn id(&self) -> ExchangeId {
        ExchangeId::Hyperliquid
    }

    fn profile(&self) -> &PageProfile {
        &PROFILE
    }

    fn symbol_files(&self) -> &'static [&'static str] {
        &["hyperliquid_200_usdc.txt"]
    }

    /// POST /info `{type: "fundingHistory", coin, startTime, endTime}`.
    /// Entries look like `{coin, fundingRate, premium, time}`, oldest first.
    async fn fetch_page(
        &self,
        symbol: &str,
        page: PageRequest,
    ) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}{INFO_PATH}", self.base_url);
        let payload = serde_json::json!({
            "type": "fundingHistory",
            "coin": coin_from_symbol(symbol),
            "startTime": page.start_ms,
            "endTime": page.end_ms
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(PROFILE.timeout)
            .send()
            .await?;

        let body = super::json_body(response).await?;
        super::expect_array(body, "hyperliquid fundingHistory")
    }
}

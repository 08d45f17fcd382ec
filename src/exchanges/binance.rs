use std::time::Duration;

use super::{Direction, Exchange, PageProfile, PageRequest};
use crate::errors::ExchangeError;
use crate::fetcher::fields::{EntrySchema, FieldCandidates};
use crate::models::ExchangeId;
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

const FUNDING_RATE_PATH: &str = "/fapi/v1/fundingRate";

/// Maximum `limit` the USD-M funding history endpoint accepts.
pub const PAGE_LIMIT: usize = 1000;

// Binance returns entries oldest first, so the cursor walks forward from the start.
const PROFILE: PageProfile = PageProfile {
    direction: Direction::Forward,
    page_limit: Some(PAGE_LIMIT),
    window_ms: None,
    page_delay: Duration::from_millis(200),
    timeout: Duration::from_secs(20),
    schema: EntrySchema {
        rate: FieldCandidates(&["fundingRate"]),
        time: FieldCandidates(&["fundingTime"]),
    },
};

pub struct Binance {
    client: reqwest::Client,
    base_url: String,
}

impl Binance {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Exchange for Binance {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn profile(&self) -> &PageProfile {
        &PROFILE
    }

    fn symbol_files(&self) -> &'static [&'static str] {
        &["binance_bybit_200_usdt.txt", "binance_200_usdc.txt"]
    }

    /// GET fapi/v1/fundingRate for `[startTime, endTime]`. The body is a bare
    /// array of `{symbol, fundingTime, fundingRate, markPrice}` objects.
    async fn fetch_page(
        &self,
        symbol: &str,
        page: PageRequest,
    ) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}{FUNDING_RATE_PATH}", self.base_url);
        let limit = page.limit.unwrap_or(PAGE_LIMIT);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("startTime", page.start_ms.to_string()),
                ("endTime", page.end_ms.to_string()),
                ("limit", limit.to_string()),
            ])
            .timeout(PROFILE.timeout)
            .send()
            .await?;

        let body = super::json_body(response).await?;
        super::expect_array(body, "binance fundingRate")
    }
}

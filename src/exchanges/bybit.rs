use std::time::Duration;

use super::{Direction, Exchange, PageProfile, PageRequest};
use crate::errors::ExchangeError;
use crate::fetcher::fields::{EntrySchema, FieldCandidates};
use crate::models::ExchangeId;
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";

const FUNDING_HISTORY_PATH: &str = "/v5/market/funding/history";

/// Maximum `limit` accepted by the v5 funding history endpoint.
pub const PAGE_LIMIT: usize = 200;

// Bybit returns the newest entries first, so the cursor recedes from the end.
const PROFILE: PageProfile = PageProfile {
    direction: Direction::Backward,
    page_limit: Some(PAGE_LIMIT),
    window_ms: None,
    page_delay: Duration::from_millis(200),
    timeout: Duration::from_secs(20),
    schema: EntrySchema {
        rate: FieldCandidates(&["fundingRate", "funding_rate", "funding"]),
        time: FieldCandidates(&["fundingRateTimestamp", "funding_time", "timestamp", "time"]),
    },
};

pub struct Bybit {
    client: reqwest::Client,
    base_url: String,
}

impl Bybit {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Pulls the entry list out of a v5 envelope:
/// `{retCode, retMsg, result: {category, list: [...]}}`.
fn entries_from_envelope(body: Value) -> Result<Vec<Value>, ExchangeError> {
    // Bybit signals errors via retCode, not just HTTP status
    if let Some(code) = body.get("retCode").and_then(Value::as_i64)
        && code != 0
    {
        let message = body
            .get("retMsg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ExchangeError::Api { code, message });
    }

    let result = match body {
        Value::Object(mut envelope) => envelope.remove("result"),
        _ => None,
    };

    match result {
        Some(Value::Object(mut result)) => match result.remove("list") {
            Some(Value::Array(list)) => Ok(list),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(ExchangeError::UnexpectedData(format!(
                "bybit result.list is not an array: {other}"
            ))),
        },
        Some(Value::Array(list)) => Ok(list),
        _ => Err(ExchangeError::UnexpectedData(
            "bybit response has no result object".to_string(),
        )),
    }
}

#[async_trait]
impl Exchange for Bybit {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    fn profile(&self) -> &PageProfile {
        &PROFILE
    }

    fn symbol_files(&self) -> &'static [&'static str] {
        &["binance_bybit_200_usdt.txt", "bybit_200_usdc.txt"]
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        page: PageRequest,
    ) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}{FUNDING_HISTORY_PATH}", self.base_url);
        let limit = page.limit.unwrap_or(PAGE_LIMIT);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("category", "linear".to_string()),
                ("symbol", symbol.to_string()),
                ("startTime", page.start_ms.to_string()),
                ("endTime", page.end_ms.to_string()),
                ("limit", limit.to_string()),
            ])
            .timeout(PROFILE.timeout)
            .send()
            .await?;

        let body = super::json_body(response).await?;
        entries_from_envelope(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HistoryFetcher;
    use httpmock::prelude::*;
    use serde_json::json;

    const START: i64 = 1_734_307_200_000;
    const EIGHT_HOURS: i64 = 8 * 3600 * 1000;

    /// `count` entries, newest first, the newest at `newest_ms`.
    fn descending_envelope(newest_ms: i64, count: usize) -> Value {
        let list: Vec<Value> = (0..count as i64)
            .map(|i| {
                json!({
                    "symbol": "ETHUSDT",
                    "fundingRate": format!("0.0000{}", i % 10),
                    "fundingRateTimestamp": (newest_ms - i * EIGHT_HOURS).to_string()
                })
            })
            .collect();
        json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": { "category": "linear", "list": list },
            "retExtInfo": {},
            "time": 1_734_400_000_000_i64
        })
    }

    #[test]
    fn envelope_with_list() {
        let entries = entries_from_envelope(descending_envelope(START, 3)).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn envelope_with_bare_result_array() {
        let body = json!({ "retCode": 0, "result": [{ "fundingRate": "0.1", "time": 1 }] });
        assert_eq!(entries_from_envelope(body).unwrap().len(), 1);
    }

    #[test]
    fn envelope_with_nonzero_ret_code_is_api_error() {
        let body = json!({ "retCode": 10001, "retMsg": "params error: symbol invalid", "result": {} });
        match entries_from_envelope(body) {
            Err(ExchangeError::Api { code, message }) => {
                assert_eq!(code, 10001);
                assert_eq!(message, "params error: symbol invalid");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_without_result_is_unexpected() {
        let body = json!({ "retCode": 0, "retMsg": "OK" });
        assert!(matches!(
            entries_from_envelope(body),
            Err(ExchangeError::UnexpectedData(_))
        ));
    }

    #[tokio::test]
    async fn fetch_page_sends_linear_category() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v5/market/funding/history")
                    .query_param("category", "linear")
                    .query_param("symbol", "ETHUSDT")
                    .query_param("startTime", START.to_string())
                    .query_param("endTime", (START + EIGHT_HOURS).to_string())
                    .query_param("limit", "200");
                then.status(200).json_body(descending_envelope(START + EIGHT_HOURS, 2));
            })
            .await;

        let bybit = Bybit::new(&server.base_url());
        let page = PageRequest {
            start_ms: START,
            end_ms: START + EIGHT_HOURS,
            limit: Some(PAGE_LIMIT),
        };
        let entries = bybit.fetch_page("ETHUSDT", page).await.unwrap();

        mock.assert_async().await;
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn backward_pages_are_returned_ascending() {
        let server = MockServer::start_async().await;
        let end = START + 1000 * EIGHT_HOURS;
        let newest = START + 604 * EIGHT_HOURS;

        // Pages recede by 200 entries each: the cursor after a page is the
        // oldest timestamp on it minus one millisecond.
        let mut mocks = Vec::new();
        for page in 0..4_i64 {
            let page_newest = newest - page * 200 * EIGHT_HOURS;
            let cursor = if page == 0 { end } else { page_newest + EIGHT_HOURS - 1 };
            let count = if page == 3 { 5 } else { 200 };
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/v5/market/funding/history")
                        .query_param("startTime", START.to_string())
                        .query_param("endTime", cursor.to_string());
                    then.status(200).json_body(descending_envelope(page_newest, count));
                })
                .await;
            mocks.push(mock);
        }

        let bybit = Bybit::new(&server.base_url());
        let fetcher = HistoryFetcher::new().with_page_delay(Duration::ZERO);
        let outcome = fetcher.fetch(&bybit, "ETHUSDT", START, end).await;

        for mock in &mocks {
            mock.assert_hits_async(1).await;
        }
        assert_eq!(outcome.pages, 4);
        assert_eq!(outcome.records.len(), 605);
        assert_eq!(outcome.records[0].funding_time_ms, START);
        assert_eq!(outcome.records[604].funding_time_ms, newest);
        assert!(
            outcome
                .records
                .windows(2)
                .all(|w| w[0].funding_time_ms < w[1].funding_time_ms)
        );
    }
}

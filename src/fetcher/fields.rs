use serde_json::Value;

use crate::models::{ExchangeId, FundingRecord};
use crate::timestamp;

/// Alternative key names for one logical field, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct FieldCandidates(pub &'static [&'static str]);

impl FieldCandidates {
    /// First candidate present on `entry` with a non-null, non-empty value.
    pub fn probe<'a>(&self, entry: &'a Value) -> Option<&'a Value> {
        let object = entry.as_object()?;
        self.0
            .iter()
            .filter_map(|key| object.get(*key))
            .find(|value| !value.is_null() && value.as_str() != Some(""))
    }
}

/// How to read a funding rate and a funding time out of one raw entry.
#[derive(Debug, Clone, Copy)]
pub struct EntrySchema {
    pub rate: FieldCandidates,
    pub time: FieldCandidates,
}

impl EntrySchema {
    pub fn normalize(
        &self,
        exchange: ExchangeId,
        symbol: &str,
        entry: &Value,
    ) -> Option<FundingRecord> {
        let funding_time_ms = timestamp::normalize_timestamp(self.time.probe(entry)?)?;
        let funding_rate = rate_text(self.rate.probe(entry)?)?;
        FundingRecord::new(exchange, symbol, funding_time_ms, funding_rate)
    }
}

/// The rate exactly as the exchange sent it.
fn rate_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: EntrySchema = EntrySchema {
        rate: FieldCandidates(&["fundingRate", "funding_rate", "funding"]),
        time: FieldCandidates(&["fundingRateTimestamp", "funding_time", "timestamp", "time"]),
    };

    #[test]
    fn probe_returns_first_present_candidate() {
        let candidates = FieldCandidates(&["a", "b", "c"]);
        let entry = json!({ "c": 3, "b": 2 });
        assert_eq!(candidates.probe(&entry), Some(&json!(2)));
    }

    #[test]
    fn probe_skips_null_and_empty_values() {
        let candidates = FieldCandidates(&["a", "b", "c"]);
        let entry = json!({ "a": null, "b": "", "c": "x" });
        assert_eq!(candidates.probe(&entry), Some(&json!("x")));
    }

    #[test]
    fn probe_on_non_object_is_none() {
        let candidates = FieldCandidates(&["a"]);
        assert_eq!(candidates.probe(&json!([1, 2])), None);
        assert_eq!(candidates.probe(&json!("a")), None);
    }

    #[test]
    fn normalize_uses_alternate_field_names() {
        let entry = json!({ "funding_rate": "-0.00012", "time": 1_734_336_000 });
        let record = SCHEMA
            .normalize(ExchangeId::Bybit, "ETHUSDT", &entry)
            .expect("normalizable");

        assert_eq!(record.funding_time_ms, 1_734_336_000_000);
        assert_eq!(record.funding_time_iso, "2024-12-16T08:00:00Z");
        assert_eq!(record.funding_rate, "-0.00012");
        assert_eq!(record.symbol, "ETHUSDT");
    }

    #[test]
    fn normalize_keeps_numeric_rates_verbatim() {
        let entry = json!({ "fundingRate": 0.0001, "fundingRateTimestamp": "1734336000000" });
        let record = SCHEMA.normalize(ExchangeId::Bybit, "BTCUSDT", &entry).unwrap();
        assert_eq!(record.funding_rate, "0.0001");
    }

    #[test]
    fn numeric_rates_keep_their_wire_text() {
        for raw in ["0.100000000000000000001", "1.0E-4", "-3.75e-5"] {
            let body = format!(r#"{{"fundingRate": {raw}, "fundingRateTimestamp": 1734336000000}}"#);
            let entry: Value = serde_json::from_str(&body).unwrap();
            let record = SCHEMA.normalize(ExchangeId::Bybit, "BTCUSDT", &entry).unwrap();
            assert_eq!(record.funding_rate, raw);
        }
    }

    #[test]
    fn times_without_an_iso_rendering_are_dropped() {
        let far_future = json!({ "fundingRate": "0.0001", "time": 253_402_300_800_000_i64 });
        let far_past = json!({ "fundingRate": "0.0001", "time": -100_000_000_000_i64 });

        for entry in [far_future, far_past] {
            assert!(SCHEMA.normalize(ExchangeId::Bybit, "BTCUSDT", &entry).is_none());
        }
    }

    #[test]
    fn normalize_drops_entries_without_usable_time_or_rate() {
        let no_time = json!({ "fundingRate": "0.0001" });
        let bad_time = json!({ "fundingRate": "0.0001", "time": "yesterday" });
        let no_rate = json!({ "time": 1_734_336_000_000_i64 });

        for entry in [no_time, bad_time, no_rate] {
            assert!(SCHEMA.normalize(ExchangeId::Bybit, "BTCUSDT", &entry).is_none());
        }
    }
}

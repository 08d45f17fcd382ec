use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Raw unix timestamps below this value are read as seconds.
pub const SECONDS_THRESHOLD: i64 = 1_000_000_000_000;

pub const DAY_MS: i64 = 24 * 3600 * 1000;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// UTC ISO-8601 rendering, e.g. `2024-12-16T08:00:00Z` or
/// `2024-12-16T08:00:00.003Z`. `None` outside years 0000-9999, which RFC 3339
/// cannot express and [`ms_from_iso`] would not read back.
pub fn iso_from_ms(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .filter(|dt| (0..=9999).contains(&dt.year()))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Parses an ISO-8601 string into epoch milliseconds. Strings without an
/// offset are taken to be UTC.
pub fn ms_from_iso(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })?;

    Some(naive.and_utc().timestamp_millis())
}

pub fn scale_to_ms(ts: i64) -> i64 {
    if ts < SECONDS_THRESHOLD {
        ts.saturating_mul(1000)
    } else {
        ts
    }
}

/// Normalizes a raw JSON timestamp to epoch milliseconds.
///
/// Integers (JSON numbers or numeric strings) are scaled from seconds when
/// they fall under [`SECONDS_THRESHOLD`]. Anything else is tried as an
/// ISO-8601 string. Returns `None` when neither works.
pub fn normalize_timestamp(raw: &Value) -> Option<i64> {
    let integer = match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match integer {
        Some(ts) => Some(scale_to_ms(ts)),
        None => raw.as_str().and_then(ms_from_iso),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(1_700_000_000), Some(1_700_000_000_000))]
    #[case(json!(1_700_000_000_000_i64), Some(1_700_000_000_000))]
    #[case(json!("1700000000"), Some(1_700_000_000_000))]
    #[case(json!("1734336000000"), Some(1_734_336_000_000))]
    #[case(json!(1_700_000_000.9), Some(1_700_000_000_000))]
    #[case(json!("2024-12-16T08:00:00Z"), Some(1_734_336_000_000))]
    #[case(json!("2024-12-16T08:00:00+00:00"), Some(1_734_336_000_000))]
    #[case(json!("2024-12-16T08:00:00.250"), Some(1_734_336_000_250))]
    #[case(json!("2024-12-16"), Some(1_734_307_200_000))]
    #[case(json!("not a time"), None)]
    #[case(json!(null), None)]
    #[case(json!(true), None)]
    fn normalizes_raw_timestamps(#[case] raw: Value, #[case] expected: Option<i64>) {
        assert_eq!(normalize_timestamp(&raw), expected);
    }

    #[test]
    fn iso_rendering_omits_zero_fraction() {
        assert_eq!(
            iso_from_ms(1_734_336_000_000).as_deref(),
            Some("2024-12-16T08:00:00Z")
        );
        assert_eq!(
            iso_from_ms(1_734_336_000_003).as_deref(),
            Some("2024-12-16T08:00:00.003Z")
        );
    }

    #[test]
    fn iso_round_trips_to_the_same_millisecond() {
        for ms in [
            0,
            1,
            999,
            1_700_000_000_000,
            1_734_336_000_003,
            1_734_336_000_120,
            4_102_444_799_999,
            253_402_300_799_999,
            -62_167_219_200_000,
        ] {
            let iso = iso_from_ms(ms).expect("in range");
            assert_eq!(ms_from_iso(&iso), Some(ms), "{iso}");
        }
    }

    #[test]
    fn out_of_range_millis_have_no_rendering() {
        assert_eq!(iso_from_ms(i64::MAX), None);
        // +10000-01-01 and -0001-12-31: valid for chrono, not for RFC 3339.
        assert_eq!(iso_from_ms(253_402_300_800_000), None);
        assert_eq!(iso_from_ms(-62_167_219_200_001), None);
        assert_eq!(iso_from_ms(-100_000_000_000_000), None);
    }
}

//! The pagination loop shared by every exchange.
//!
//! An [`Exchange`] only knows how to request one page; this module walks
//! the cursor across the requested range, normalizes entries and decides
//! when a range is exhausted.

pub mod fields;

use std::time::Duration;

use crate::exchanges::{Direction, Exchange, PageProfile, PageRequest};
use crate::models::{self, FundingRecord};

/// Time boundary of one pagination loop over `[start_ms, end_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    direction: Direction,
    position: i64,
    start_ms: i64,
    end_ms: i64,
    limit: Option<usize>,
}

impl PageCursor {
    pub fn new(profile: &PageProfile, start_ms: i64, end_ms: i64) -> Self {
        let position = match profile.direction {
            Direction::Forward => start_ms,
            Direction::Backward => end_ms,
        };
        Self {
            direction: profile.direction,
            position,
            start_ms,
            end_ms,
            limit: profile.page_limit,
        }
    }

    pub fn request(&self) -> PageRequest {
        let (start_ms, end_ms) = match self.direction {
            Direction::Forward => (self.position, self.end_ms),
            Direction::Backward => (self.start_ms, self.position),
        };
        PageRequest {
            start_ms,
            end_ms,
            limit: self.limit,
        }
    }

    /// Moves the cursor one millisecond past `last_ms` in its direction of
    /// travel. Returns `false` when the move would not make progress or
    /// would leave the window; the cursor is left unchanged in the former case.
    pub fn advance(&mut self, last_ms: i64) -> bool {
        let next = match self.direction {
            Direction::Forward => last_ms.saturating_add(1),
            Direction::Backward => last_ms.saturating_sub(1),
        };
        let progressed = match self.direction {
            Direction::Forward => next > self.position,
            Direction::Backward => next < self.position,
        };
        if !progressed {
            return false;
        }

        self.position = next;
        match self.direction {
            Direction::Forward => next <= self.end_ms,
            Direction::Backward => next >= self.start_ms,
        }
    }
}

/// Splits `[start_ms, end_ms]` into consecutive inclusive windows of at most
/// `window_ms`. Without a window length the whole range is one window.
pub fn windows(start_ms: i64, end_ms: i64, window_ms: Option<i64>) -> Vec<(i64, i64)> {
    let Some(window_ms) = window_ms.filter(|w| *w > 0) else {
        return vec![(start_ms, end_ms)];
    };

    let mut out = Vec::new();
    let mut cur = start_ms;
    while cur <= end_ms {
        let window_end = cur.saturating_add(window_ms - 1).min(end_ms);
        out.push((cur, window_end));
        if window_end == i64::MAX {
            break;
        }
        cur = window_end + 1;
    }
    out
}

/// What one symbol fetch produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Ascending by funding time, one row per timestamp.
    pub records: Vec<FundingRecord>,
    /// Successful page responses, empty ones included.
    pub pages: usize,
    /// Entries dropped because no usable time or rate could be read.
    pub skipped: usize,
    /// Rows dropped for repeating an earlier timestamp.
    pub duplicates: usize,
    /// Why pagination stopped early, if it did.
    pub aborted: Option<String>,
}

enum PageStep {
    Continue,
    WindowDone,
    Abort(String),
}

#[derive(Debug, Default, Clone)]
pub struct HistoryFetcher {
    page_delay: Option<Duration>,
}

impl HistoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides every exchange's own delay between page requests.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Fetches the funding history of `symbol` over `[start_ms, end_ms]`.
    ///
    /// Never fails: a request error ends pagination and whatever was
    /// collected up to that point is returned, with the cause recorded in
    /// [`FetchOutcome::aborted`].
    pub async fn fetch(
        &self,
        exchange: &dyn Exchange,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> FetchOutcome {
        let profile = exchange.profile();
        let delay = self.page_delay.unwrap_or(profile.page_delay);
        let mut outcome = FetchOutcome::default();
        let mut requests = 0usize;

        'windows: for (window_start, window_end) in windows(start_ms, end_ms, profile.window_ms) {
            let mut cursor = PageCursor::new(profile, window_start, window_end);

            loop {
                if requests > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                requests += 1;

                let request = cursor.request();
                let entries = match exchange.fetch_page(symbol, request).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(
                            exchange = %exchange.id(),
                            symbol,
                            start_ms = request.start_ms,
                            end_ms = request.end_ms,
                            "funding history request failed: {e}"
                        );
                        outcome.aborted = Some(e.to_string());
                        break 'windows;
                    }
                };
                outcome.pages += 1;

                match self.absorb_page(exchange, symbol, &entries, &mut cursor, &mut outcome) {
                    PageStep::Continue => {}
                    PageStep::WindowDone => break,
                    PageStep::Abort(reason) => {
                        tracing::warn!(exchange = %exchange.id(), symbol, "{reason}");
                        outcome.aborted = Some(reason);
                        break 'windows;
                    }
                }
            }
        }

        if profile.direction == Direction::Backward {
            outcome.records.reverse();
        }
        let dedup = models::sort_and_dedup(&mut outcome.records);
        outcome.duplicates = dedup.dropped;
        if dedup.conflicting > 0 {
            tracing::warn!(
                exchange = %exchange.id(),
                symbol,
                conflicting = dedup.conflicting,
                "dropped repeated funding times carrying different rates"
            );
        }

        record_metrics(exchange, &outcome);
        tracing::info!(
            exchange = %exchange.id(),
            symbol,
            records = outcome.records.len(),
            pages = outcome.pages,
            skipped = outcome.skipped,
            duplicates = outcome.duplicates,
            aborted = outcome.aborted.is_some(),
            "fetched funding history"
        );

        outcome
    }

    fn absorb_page(
        &self,
        exchange: &dyn Exchange,
        symbol: &str,
        entries: &[serde_json::Value],
        cursor: &mut PageCursor,
        outcome: &mut FetchOutcome,
    ) -> PageStep {
        if entries.is_empty() {
            return PageStep::WindowDone;
        }

        let profile = exchange.profile();
        let mut last_ms = None;
        for entry in entries {
            match profile.schema.normalize(exchange.id(), symbol, entry) {
                Some(record) => {
                    last_ms = Some(record.funding_time_ms);
                    outcome.records.push(record);
                }
                None => outcome.skipped += 1,
            }
        }

        tracing::debug!(
            exchange = %exchange.id(),
            symbol,
            entries = entries.len(),
            total = outcome.records.len(),
            "page received"
        );

        if profile.page_limit.is_some_and(|limit| entries.len() < limit) {
            return PageStep::WindowDone;
        }

        let Some(last_ms) = last_ms else {
            return PageStep::Abort(format!(
                "page of {} entries had no readable timestamp to advance past",
                entries.len()
            ));
        };

        let before = *cursor;
        if cursor.advance(last_ms) {
            PageStep::Continue
        } else if *cursor == before {
            PageStep::Abort(format!(
                "cursor stuck: last entry at {last_ms} does not move past {:?}",
                before.request()
            ))
        } else {
            PageStep::WindowDone
        }
    }
}

fn record_metrics(exchange: &dyn Exchange, outcome: &FetchOutcome) {
    let name = exchange.id().as_str();
    metrics::counter!("funding_pages_total", "exchange" => name).increment(outcome.pages as u64);
    metrics::counter!("funding_records_total", "exchange" => name)
        .increment(outcome.records.len() as u64);
    metrics::counter!("funding_entries_skipped_total", "exchange" => name)
        .increment(outcome.skipped as u64);
    if outcome.aborted.is_some() {
        metrics::counter!("funding_fetch_aborted_total", "exchange" => name).increment(1);
    }
}

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::exchanges::{self, Exchange};
use crate::fetcher::HistoryFetcher;
use crate::output::FundingGroups;
use crate::symbols;
use crate::timestamp;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub symbols: usize,
    pub records: usize,
    pub aborted: usize,
    pub files: Vec<PathBuf>,
}

/// Fetches every configured exchange/symbol pair up to now and writes the CSVs.
pub async fn run(config: &Config) -> Result<RunSummary> {
    let window = config.window(timestamp::now_ms())?;
    let exchanges = config
        .exchanges
        .iter()
        .map(|id| exchanges::build(*id, config))
        .collect();
    run_with(config, exchanges, window).await
}

pub async fn run_with(
    config: &Config,
    exchanges: Vec<Box<dyn Exchange>>,
    (start_ms, end_ms): (i64, i64),
) -> Result<RunSummary> {
    let mut plan = Vec::with_capacity(exchanges.len());
    for exchange in exchanges {
        let symbols = if config.symbols.is_empty() {
            symbols::read_symbol_files(&config.symbols_dir, exchange.symbol_files())?
        } else {
            symbols::collect_symbols(config.symbols.iter().map(String::as_str))
        };
        tracing::info!(
            exchange = %exchange.id(),
            count = symbols.len(),
            sample = ?symbols.iter().take(10).collect::<Vec<_>>(),
            "loaded symbols"
        );
        plan.push((exchange, symbols));
    }

    let mut summary = RunSummary::default();
    if plan.iter().all(|(_, symbols)| symbols.is_empty()) {
        tracing::error!(
            dir = %config.symbols_dir.display(),
            "no symbols found; check the symbol list files"
        );
        return Ok(summary);
    }

    tracing::info!(
        start = %timestamp::iso_from_ms(start_ms).unwrap_or_default(),
        end = %timestamp::iso_from_ms(end_ms).unwrap_or_default(),
        "fetch window"
    );

    let mut fetcher = HistoryFetcher::new();
    if let Some(delay) = config.page_delay() {
        fetcher = fetcher.with_page_delay(delay);
    }

    let mut groups = FundingGroups::default();
    for (exchange, symbols) in &plan {
        for symbol in symbols {
            tracing::info!(exchange = %exchange.id(), %symbol, "fetching funding history");
            let outcome = fetcher.fetch(exchange.as_ref(), symbol, start_ms, end_ms).await;

            summary.symbols += 1;
            if outcome.aborted.is_some() {
                summary.aborted += 1;
            }
            if outcome.records.is_empty() {
                tracing::warn!(exchange = %exchange.id(), %symbol, "no funding history found");
            }
            groups.extend(outcome.records);
        }
    }

    summary.records = groups.record_count();
    summary.files = groups.write_all(&config.output_dir)?;

    tracing::info!(
        symbols = summary.symbols,
        records = summary.records,
        files = summary.files.len(),
        aborted = summary.aborted,
        "done"
    );
    Ok(summary)
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{self, ExchangeId, FundingRecord};

/// Anything but alphanumerics, `-` and `_` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn funding_file_name(exchange: ExchangeId, symbol: &str) -> String {
    format!("{exchange}_funding_{}.csv", sanitize_filename(symbol))
}

/// Records bucketed by (exchange, symbol), in a stable order.
#[derive(Debug, Default)]
pub struct FundingGroups {
    groups: BTreeMap<(ExchangeId, String), Vec<FundingRecord>>,
}

impl FundingGroups {
    pub fn extend(&mut self, records: impl IntoIterator<Item = FundingRecord>) {
        for record in records {
            self.groups
                .entry((record.exchange, record.symbol.clone()))
                .or_default()
                .push(record);
        }
    }

    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Writes one CSV per group into `dir`, creating it if needed.
    /// Returns the written paths.
    pub fn write_all(self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let mut written = Vec::with_capacity(self.groups.len());
        for ((exchange, symbol), mut rows) in self.groups {
            models::sort_and_dedup(&mut rows);
            let path = dir.join(funding_file_name(exchange, &symbol));
            write_csv(&path, &rows)?;
            tracing::info!(path = %path.display(), rows = rows.len(), "saved funding history");
            written.push(path);
        }
        Ok(written)
    }
}

/// Header row: `exchange,symbol,funding_time_ms,funding_time_iso,funding_rate`.
pub fn write_csv(path: &Path, rows: &[FundingRecord]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Strips whitespace and markdown backticks; `None` if nothing is left.
pub fn clean_symbol(raw: &str) -> Option<&str> {
    let symbol = raw.trim_matches(|c: char| c == '`' || c.is_whitespace());
    (!symbol.is_empty()).then_some(symbol)
}

/// Cleans, deduplicates and sorts symbols.
pub fn collect_symbols<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    raw.into_iter()
        .filter_map(clean_symbol)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reads one symbol per line from each of `files` under `dir`.
/// Files that do not exist are skipped.
pub fn read_symbol_files(dir: &Path, files: &[&str]) -> Result<Vec<String>> {
    let mut contents = Vec::new();
    for file in files {
        let path = dir.join(file);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "symbol file not found, skipping");
            continue;
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading symbol file {}", path.display()))?;
        contents.push(text);
    }

    Ok(collect_symbols(contents.iter().flat_map(|text| text.lines())))
}

//! Newline-delimited JSON ping files on local disk

use super::{RecordQuery, RecordSource};
use async_trait::async_trait;
use serde_json::Value;
use shield_common::{Error, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PING_EXTENSIONS: [&str; 3] = ["json", "jsonl", "ndjson"];

/// Reads every `*.json`, `*.jsonl` and `*.ndjson` file under a root, one
/// ping per line
#[derive(Debug, Clone)]
pub struct NdjsonSource {
    root: PathBuf,
}

/// Line accounting for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub lines: usize,
    pub malformed: usize,
    pub filtered_out: usize,
    pub sampled_out: usize,
    pub kept: usize,
}

impl NdjsonSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ping files under the root in path order
    pub fn ping_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::SourceUnavailable {
                url: self.root.display().to_string(),
                reason: "input directory does not exist".to_string(),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| has_ping_extension(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Scan synchronously, returning matching pings and line accounting
    pub fn scan(&self, query: &RecordQuery) -> Result<(Vec<Value>, ScanStats)> {
        let mut stats = ScanStats::default();
        let mut sampler = query.sampler();
        let mut pings = Vec::new();

        for path in self.ping_files()? {
            stats.files += 1;
            let file = std::fs::File::open(&path)?;

            // Raw bytes per line: undecodable text counts as malformed
            for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
                let line = line?;
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                stats.lines += 1;

                let ping: Value = match serde_json::from_slice(&line) {
                    Ok(ping) => ping,
                    Err(e) => {
                        stats.malformed += 1;
                        debug!(file = %path.display(), line = index + 1, "Malformed ping: {}", e);
                        continue;
                    }
                };

                if !query.matches(&ping) {
                    stats.filtered_out += 1;
                } else if !sampler.keep() {
                    stats.sampled_out += 1;
                } else {
                    stats.kept += 1;
                    pings.push(ping);
                }
            }
        }

        if stats.malformed > 0 {
            warn!(malformed = stats.malformed, "Skipped malformed ping lines");
        }
        Ok((pings, stats))
    }
}

fn has_ping_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PING_EXTENSIONS.contains(&ext))
}

#[async_trait]
impl RecordSource for NdjsonSource {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Value>> {
        let source = self.clone();
        let query = query.clone();

        let (pings, stats) = tokio::task::spawn_blocking(move || source.scan(&query))
            .await
            .map_err(|e| Error::Internal(format!("ping scan task failed: {}", e)))??;

        info!(
            root = %self.root.display(),
            files = stats.files,
            lines = stats.lines,
            kept = stats.kept,
            filtered_out = stats.filtered_out,
            sampled_out = stats.sampled_out,
            "Scanned ping files"
        );
        Ok(pings)
    }
}

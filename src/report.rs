use std::path::{Path, PathBuf};
use tracing::debug;

use crate::aggregate::AggregatedRecord;
use crate::error::Result;

/// Accumulates the rows for one swept parameter and writes them as a single
/// JSON array.
pub struct ReportWriter {
    path: PathBuf,
    records: Vec<AggregatedRecord>,
}

impl ReportWriter {
    pub fn new(results_dir: &Path, asr_key: &str, param_key: &str) -> Self {
        Self {
            path: report_path(results_dir, asr_key, param_key),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[AggregatedRecord] {
        &self.records
    }

    pub fn append(&mut self, record: AggregatedRecord) {
        self.records.push(record);
    }

    /// Replaces any previous report for the same parameter.
    pub async fn flush(self) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent).await?;
        }
        let payload = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        debug!(path = %self.path.display(), rows = self.records.len(), "report written");
        Ok(self.path)
    }
}

pub fn report_path(results_dir: &Path, asr_key: &str, param_key: &str) -> PathBuf {
    results_dir.join(format!("{}_{}.json", asr_key, param_key))
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

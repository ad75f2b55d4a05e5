//! Append-only CSV secondary store for trade records

use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use crate::{errors::StoreResult, types::TradeRecord};

#[derive(Debug)]
pub struct CsvTradeStore {
    path: PathBuf,
    /// Serializes appends so rows from concurrent saves never interleave.
    write_lock: Mutex<()>,
}

impl CsvTradeStore {
    /// Creates the parent directory if needed. The file itself is created on
    /// the first append.
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first when the file is new or
    /// empty.
    pub fn append(&self, trade: &TradeRecord) -> StoreResult<()> {
        // A poisoned lock only means another append panicked; the file is
        // still usable.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(trade)?;
        writer.flush()?;

        debug!(option = %trade.option_code, path = %self.path.display(), "Trade appended to CSV");
        Ok(())
    }

    /// Rows with `trade_time >= cutoff`, newest first. Rows that fail to
    /// parse are skipped. A missing file reads as empty.
    pub fn load_since(&self, cutoff: NaiveDateTime) -> StoreResult<Vec<TradeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<TradeRecord>() {
            match row {
                Ok(record) if record.trade_time >= cutoff => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "Unreadable CSV row");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %self.path.display(), "Skipped malformed CSV rows");
        }

        records.sort_by(|a, b| b.trade_time.cmp(&a.trade_time));
        Ok(records)
    }
}

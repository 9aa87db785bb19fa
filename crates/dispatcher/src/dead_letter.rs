//! DeadLetterStore - where exhausted pairs end up

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::DeadLetter;
use tracing::{error, warn};

use crate::error::DispatcherError;

/// Bounded in-memory list plus an optional JSON lines file
pub struct DeadLetterStore {
    entries: VecDeque<DeadLetter>,
    capacity: usize,
    total: u64,
    file: Option<(PathBuf, BufWriter<File>)>,
}

impl DeadLetterStore {
    /// Memory-only store
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            total: 0,
            file: None,
        }
    }

    /// Store that also appends to `path`
    pub fn with_file(capacity: usize, path: impl AsRef<Path>) -> Result<Self, DispatcherError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DispatcherError::DeadLetter(format!("{}: {e}", path.display())))?;

        let mut store = Self::in_memory(capacity);
        store.file = Some((path, BufWriter::new(file)));
        Ok(store)
    }

    /// Keep a dead letter
    ///
    /// A failing file write is logged; the entry stays in memory.
    pub fn push(&mut self, letter: DeadLetter) {
        warn!(
            event_id = %letter.event_id,
            sink = %letter.sink_id,
            attempts = letter.attempts,
            error = %letter.error,
            "Dead letter"
        );

        if let Some((path, writer)) = self.file.as_mut() {
            let written = serde_json::to_vec(&letter)
                .map_err(std::io::Error::other)
                .and_then(|mut line| {
                    line.push(b'\n');
                    writer.write_all(&line)?;
                    writer.flush()
                });
            if let Err(e) = written {
                error!(path = %path.display(), error = %e, "Dead-letter write failed");
            }
        }

        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(letter);
    }

    /// Dead letters written since start, including evicted ones
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn entries(&self) -> impl Iterator<Item = &DeadLetter> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<DeadLetter> {
        self.entries.into()
    }
}

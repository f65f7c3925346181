/*
 * stats.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Timing and dependency record for one compilation.
 */

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Entry name used when compiling inline content.
pub const DATA_ENTRY: &str = "data";

/// Timing and dependency record for one compilation.
///
/// `start` is taken when options are normalized. `end`, `duration` and
/// `included_files` are only filled in when the compilation succeeds.
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub entry: String,
    pub start: u64,
    pub end: Option<u64>,
    pub duration: Option<u64>,
    pub included_files: Vec<PathBuf>,
}

impl Stats {
    /// Start a record for `entry` (a file path, or [`DATA_ENTRY`]).
    pub fn begin(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            start: now_millis(),
            end: None,
            duration: None,
            included_files: Vec::new(),
        }
    }

    /// Close the record. `included_files` is taken as reported by the engine,
    /// order and duplicates included.
    pub fn finish(&mut self, included_files: Vec<PathBuf>) {
        // The wall clock may step backwards; never report a negative duration.
        let end = now_millis().max(self.start);
        self.end = Some(end);
        self.duration = Some(end - self.start);
        self.included_files = included_files;
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only serializer used by adapters to emit events onto the IPC bus.
//!
//! See spec.md §4.1. One [`IpcWriter`] is the one logical writer for a given
//! IPC file (invariant G-5); nothing here enforces that across processes,
//! it's a contract the orchestrator upholds by handing each child a single
//! path.

use std::fs::{File, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::errors::IpcWriteError;
use crate::event::Event;

/// Writes [`Event`]s to an IPC file, one JSON object per line.
#[derive(Debug)]
pub struct IpcWriter {
    path: Utf8PathBuf,
    file: File,
}

impl IpcWriter {
    /// Opens (creating if necessary) the IPC file for append.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, IpcWriteError> {
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| IpcWriteError::Denied {
                path: path.clone(),
                error,
            })?;
        Ok(Self { path, file })
    }

    /// Serializes `event` and appends it as a single `\n`-terminated line.
    ///
    /// The write is a single `write_all` call so that, for records under
    /// the platform's atomic-append limit, the OS guarantees the write is
    /// whole-record atomic from a concurrent reader's perspective. Larger
    /// records rely on [`crate::reader::IpcReader`]'s carry-over handling
    /// of torn trailing bytes rather than any extra framing here.
    pub fn append(&mut self, event: &Event) -> Result<(), IpcWriteError> {
        let mut line = event
            .to_line()
            .map_err(|error| IpcWriteError::Serialize {
                path: self.path.clone(),
                error,
            })?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|error| IpcWriteError::Denied {
                path: self.path.clone(),
                error,
            })
    }

    /// Like [`Self::append`] but swallows the error after logging it, per
    /// spec.md §4.1: IPC write failures must never be raised into the
    /// wrapped test runner's own flow.
    pub fn append_lossy(&mut self, event: &Event) {
        if let Err(error) = self.append(event) {
            tracing::debug!(%error, path = %self.path, "failed to append IPC event");
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TestStatus;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ipc.jsonl");
        let mut writer = IpcWriter::open(&path).unwrap();

        writer
            .append(&Event::TestFileResult {
                file_path: "a".into(),
                status: TestStatus::Pass,
            })
            .unwrap();
        writer
            .append(&Event::TestFileResult {
                file_path: "b".into(),
                status: TestStatus::Fail,
            })
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with('}'));
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ipc.jsonl");
        {
            let mut writer = IpcWriter::open(&path).unwrap();
            writer
                .append(&Event::TestFileResult {
                    file_path: "a".into(),
                    status: TestStatus::Pass,
                })
                .unwrap();
        }
        {
            let mut writer = IpcWriter::open(&path).unwrap();
            writer
                .append(&Event::TestFileResult {
                    file_path: "b".into(),
                    status: TestStatus::Pass,
                })
                .unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

// Error taxonomy for the IPC bus. See spec.md §7.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors produced while appending an event to the IPC file.
///
/// Per spec.md §4.1, these are always handled locally by the adapter (logged,
/// never raised into the wrapped test runner's own control flow).
#[derive(Debug, Error)]
pub enum IpcWriteError {
    #[error("failed to serialize event for IPC file `{path}`")]
    Serialize {
        path: Utf8PathBuf,
        #[source]
        error: serde_json::Error,
    },

    #[error("failed to open IPC file `{path}` for append")]
    Denied {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
}

/// Errors produced while tailing the IPC file.
#[derive(Debug, Error)]
pub enum IpcReadError {
    /// The IPC file was removed mid-run and did not reappear within the
    /// retry window. Fatal to the reader, not to the orchestrator: the
    /// caller finalizes with whatever state was observed so far.
    #[error("IPC file `{path}` was removed and did not reappear")]
    FileLost { path: Utf8PathBuf },

    #[error("failed to read IPC file `{path}`")]
    Io {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
}

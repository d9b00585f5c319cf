// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The IPC event bus between an adapter (injected into the child test
//! runner) and the orchestrator.
//!
//! Covers C1 (writer), C2 (reader) and C3 (event schema) from the design.
//! The bus is a single append-only newline-delimited JSON file; see
//! `spec.md` §3, §4.1, §4.2 and §6.

pub mod errors;
pub mod event;
pub mod reader;
pub mod writer;

pub use errors::{IpcReadError, IpcWriteError};
pub use event::{ErrorDetails, Event, TestStatus};
pub use reader::IpcReader;
pub use writer::IpcWriter;

/// Name of the environment variable the orchestrator sets in the child
/// process's environment to point an adapter at its IPC file (spec.md §6).
pub const IPC_PATH_ENV_VAR: &str = "THREEPIO_IPC_PATH";

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

// Error taxonomy for the orchestrator (C7). See spec.md §7.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to create run directory `{path}`")]
    RunDirCreate {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// CHILD_SPAWN: the orchestrator fails fast with exit code 2.
    #[error("failed to spawn test command `{command:?}`")]
    ChildSpawn {
        command: Vec<String>,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to set up signal handling")]
    SignalSetup(#[source] std::io::Error),

    #[error("no test command was given")]
    EmptyCommand,
}

/// The orchestrator's exit code mapping (spec.md §4.5 step 6 / §6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitCode {
    Success = 0,
    TestFailures = 1,
    OrchestrationError = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

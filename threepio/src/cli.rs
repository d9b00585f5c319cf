// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command-line surface (spec.md §6): `3pio <test-command...>`.

use clap::Parser;

/// Runs a test command under the orchestrator, producing a Markdown report
/// under `.3pio/runs/<runId>/` that updates as the run progresses.
#[derive(Debug, Parser)]
#[command(name = "3pio", version, about)]
pub struct Cli {
    /// The test runner invocation to wrap, e.g. `npm test` or `pytest -k foo`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

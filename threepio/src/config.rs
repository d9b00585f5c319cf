// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tunables for the orchestrator, with the defaults named in spec.md.

use std::time::Duration;

/// Configuration for a run session. All fields have the defaults spec.md
/// calls out explicitly; callers (tests, or a future CLI flag) can
/// override them.
#[derive(Clone, Copy, Debug)]
pub struct ThreepioConfig {
    /// How long the orchestrator waits for the IPC reader to drain after
    /// the child exits, before closing it (spec.md §4.5 step 5).
    pub drain_grace_period: Duration,
    /// How long the orchestrator waits for the child to exit after
    /// forwarding a termination signal, before force-killing it (spec.md
    /// §5 "Cancellation").
    pub terminate_grace_period: Duration,
    /// Poll interval for the IPC reader (spec.md §4.2 is silent on the
    /// exact value; this is small enough to feel "near real time").
    pub ipc_poll_interval: Duration,
    /// Bounded retry window before a removed IPC file is treated as lost
    /// (spec.md §4.2: "a short retry loop (bounded; e.g., 500 ms)").
    pub ipc_file_lost_retry: Duration,
}

impl Default for ThreepioConfig {
    fn default() -> Self {
        Self {
            drain_grace_period: Duration::from_secs(2),
            terminate_grace_period: Duration::from_secs(2),
            ipc_poll_interval: threepio_ipc::reader::DEFAULT_POLL_INTERVAL,
            ipc_file_lost_retry: threepio_ipc::reader::DEFAULT_FILE_LOST_RETRY,
        }
    }
}

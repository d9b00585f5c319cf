// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The hierarchical group model and debounced Markdown report writers.
//!
//! Covers C4 (group model), C5 (per-group reports), C6 (run report), C8
//! (path sanitization) and C9 (session directory layout) from the design.

pub mod debounce;
pub mod group_report;
pub mod layout;
pub mod model;
pub mod render;
pub mod run_report;
pub mod sanitize;

pub use group_report::GroupReportManager;
pub use layout::{RunLayout, generate_run_id};
pub use model::{Group, GroupModel, GroupStatus, OutputStream, Test};
pub use render::RunMeta;
pub use run_report::RunReportManager;
pub use sanitize::sanitize;

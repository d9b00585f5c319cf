// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure Markdown rendering over a snapshot of the [`GroupModel`], plus the
//! shared disk-write helper used by both report managers.
//!
//! Rendering never touches the model's lock: callers clone a snapshot,
//! drop the lock, then render and write (spec.md §9 "Debounce over
//! reactive recomputation").

use camino::Utf8Path;
use chrono::{DateTime, Utc};

use crate::layout::RunLayout;
use crate::model::{Group, GroupModel, GroupStatus};
use crate::sanitize::sanitize;

/// Top-level metadata about the run, for the run report's header.
#[derive(Clone, Debug)]
pub struct RunMeta {
    pub run_id: String,
    pub command: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

fn relative_group_path(layout: &RunLayout, suite_chain: &[String]) -> String {
    let full = layout.group_index_md(suite_chain);
    full.strip_prefix(layout.run_dir())
        .map(|p| p.to_string())
        .unwrap_or_else(|_| full.to_string())
}

/// Renders the top-level `test-run.md` report (spec.md §4.4).
pub fn render_run_report(meta: &RunMeta, model: &GroupModel, layout: &RunLayout) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Test Run {}\n\n", meta.run_id));
    out.push_str(&format!("- Command: `{}`\n", meta.command.join(" ")));
    out.push_str(&format!(
        "- Started: {}\n",
        meta.started_at.to_rfc3339()
    ));
    match meta.ended_at {
        Some(ended) => out.push_str(&format!("- Ended: {}\n", ended.to_rfc3339())),
        None => out.push_str("- Ended: (in progress)\n"),
    }
    out.push('\n');

    out.push_str("## Groups\n\n");
    if model.top_level.is_empty() {
        out.push_str("_No groups reported yet._\n\n");
    } else {
        for group in &model.top_level {
            let chain = vec![group.name.clone()];
            out.push_str(&format!(
                "- [{}] `{}` — Group tests: {}, Group tests passed: {}, Subgroups: {} ([report]({}))\n",
                group.status.label(),
                group.name,
                group.test_count(),
                group.tests_passed_count(),
                group.subgroups.len(),
                relative_group_path(layout, &chain),
            ));
        }
        out.push('\n');
    }

    let failures = model.failing_groups();
    out.push_str("## Failures\n\n");
    if failures.is_empty() {
        out.push_str("_No failures._\n");
    } else {
        for (chain, group) in failures {
            let detail = group
                .error_details
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("see report for details");
            out.push_str(&format!(
                "- `{}` — {} ([report]({}))\n",
                chain.join(" > "),
                detail,
                relative_group_path(layout, &chain),
            ));
        }
    }

    out
}

/// Renders a single group's `index.md` (spec.md §4.4).
pub fn render_group_report(suite_chain: &[String], group: &Group) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", group.name));
    out.push_str(&format!("- Status: {}\n", group.status.label()));
    out.push_str(&format!("- Group tests: {}\n", group.test_count()));
    out.push_str(&format!(
        "- Group tests passed: {}\n",
        group.tests_passed_count()
    ));
    if let Some(error) = &group.error_details {
        out.push_str(&format!("- Error: {}\n", error.message));
    }
    out.push('\n');

    out.push_str("## Tests\n\n");
    if group.tests.is_empty() {
        out.push_str("_No direct tests._\n\n");
    } else {
        for test in &group.tests {
            let status_label = test
                .status
                .map(|s| GroupStatus::from(s).label())
                .unwrap_or("RUNNING");
            let duration = test
                .duration_ms
                .map(|ms| format!(" ({ms} ms)"))
                .unwrap_or_default();
            out.push_str(&format!("- [{status_label}] {}{duration}\n", test.name));
            if let Some(message) = &test.error_message {
                out.push_str(&format!("  - {message}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("## Subgroups\n\n");
    if group.subgroups.is_empty() {
        out.push_str("_No subgroups._\n\n");
    } else {
        for subgroup in &group.subgroups {
            out.push_str(&format!(
                "- [{}] [{}](groups/{}/index.md)\n",
                subgroup.status.label(),
                subgroup.name,
                sanitize(&subgroup.name),
            ));
        }
        out.push('\n');
    }

    let _ = suite_chain; // retained for future cross-links; not needed by the body today.

    if !group.stdout_log.is_empty() {
        out.push_str("## stdout\n\n```\n");
        out.push_str(&group.stdout_log);
        if !group.stdout_log.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n\n");
    }
    if !group.stderr_log.is_empty() {
        out.push_str("## stderr\n\n```\n");
        out.push_str(&group.stderr_log);
        if !group.stderr_log.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n\n");
    }

    out
}

/// Writes `content` to `path`, creating parent directories as needed.
/// Retried once on failure; a second failure is logged and the write is
/// skipped, per spec.md §7 (REPORT_WRITE).
pub async fn write_report_file(path: &Utf8Path, content: &str) {
    for attempt in 0..2 {
        if let Some(parent) = path.parent() {
            if let Err(error) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(%error, path = %parent, "failed to create report directory");
            }
        }
        match tokio::fs::write(path, content).await {
            Ok(()) => return,
            Err(error) => {
                tracing::debug!(%error, path = %path, attempt, "report write failed");
                if attempt == 1 {
                    tracing::warn!(path = %path, "report write failed twice, skipping (report may be stale)");
                }
            }
        }
    }
}

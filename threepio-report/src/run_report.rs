// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C6: the top-level `test-run.md` renderer with debounced flush and the
//! finalization barrier (spec.md §4.4, §4.5).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::debounce::Debouncer;
use crate::layout::RunLayout;
use crate::model::GroupModel;
use crate::render::{RunMeta, render_run_report, write_report_file};

/// Debounce delay for the top-level run report (spec.md §4.4).
pub const RUN_REPORT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct RunReportManager {
    layout: RunLayout,
    model: Arc<Mutex<GroupModel>>,
    meta: Arc<Mutex<RunMeta>>,
    debouncer: Arc<Debouncer<()>>,
}

impl RunReportManager {
    pub fn new(layout: RunLayout, model: Arc<Mutex<GroupModel>>, meta: RunMeta) -> Self {
        Self::with_debounce(layout, model, meta, RUN_REPORT_DEBOUNCE)
    }

    pub fn with_debounce(
        layout: RunLayout,
        model: Arc<Mutex<GroupModel>>,
        meta: RunMeta,
        delay: Duration,
    ) -> Self {
        Self {
            layout,
            model,
            meta: Arc::new(Mutex::new(meta)),
            debouncer: Arc::new(Debouncer::new(delay)),
        }
    }

    /// Arms (or resets) the single debounce timer for the run report.
    pub async fn schedule_write(&self) {
        let layout = self.layout.clone();
        let model = self.model.clone();
        let meta = self.meta.clone();
        self.debouncer
            .schedule((), move |_| async move {
                flush_run_report(&layout, &model, &meta).await;
            })
            .await;
    }

    /// Records that the run has ended, for the header's "Ended" line.
    pub fn mark_ended(&self) {
        self.meta.lock().expect("run meta mutex poisoned").ended_at = Some(Utc::now());
    }

    /// Cancels the pending timer (if any), renders and writes once
    /// synchronously. Safe to call even with nothing pending — finalize
    /// always produces a `test-run.md`, per spec.md §7.
    pub async fn finalize(&self) {
        self.debouncer.drain_pending().await;
        flush_run_report(&self.layout, &self.model, &self.meta).await;
    }
}

async fn flush_run_report(
    layout: &RunLayout,
    model: &Arc<Mutex<GroupModel>>,
    meta: &Arc<Mutex<RunMeta>>,
) {
    let snapshot = {
        let mut guard = model.lock().expect("group model mutex poisoned");
        guard.recompute_statuses();
        // Clone behind the lock, then render outside it.
        GroupModel {
            top_level: guard.top_level.clone(),
        }
    };
    let meta_snapshot = meta.lock().expect("run meta mutex poisoned").clone();
    let content = render_run_report(&meta_snapshot, &snapshot, layout);
    write_report_file(&layout.test_run_md(), &content).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use threepio_ipc::TestStatus;

    fn meta() -> RunMeta {
        RunMeta {
            run_id: "run-1".into(),
            command: vec!["npm".into(), "test".into()],
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn finalize_always_produces_a_report_even_with_no_pending_writes() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let model = Arc::new(Mutex::new(GroupModel::new()));
        let manager = RunReportManager::new(layout.clone(), model, meta());

        manager.finalize().await;

        let content = tokio::fs::read_to_string(layout.test_run_md()).await.unwrap();
        assert!(content.contains("Test Run run-1"));
    }

    #[tokio::test]
    async fn ended_header_reflects_mark_ended() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let model = Arc::new(Mutex::new(GroupModel::new()));
        model
            .lock()
            .unwrap()
            .record_file_result("a", TestStatus::Pass);
        let manager = RunReportManager::new(layout.clone(), model, meta());

        manager.mark_ended();
        manager.finalize().await;

        let content = tokio::fs::read_to_string(layout.test_run_md()).await.unwrap();
        assert!(!content.contains("in progress"));
    }
}

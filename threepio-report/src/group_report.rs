// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C5: the per-group Markdown renderer with debounced flush (spec.md
//! §4.4). One [`GroupReportManager`] serves every group in a run; targets
//! are distinguished by their suite chain.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::debounce::Debouncer;
use crate::layout::RunLayout;
use crate::model::GroupModel;
use crate::render::{render_group_report, write_report_file};

/// Debounce delay for per-group reports (spec.md §4.4).
pub const GROUP_REPORT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct GroupReportManager {
    layout: RunLayout,
    model: Arc<Mutex<GroupModel>>,
    debouncer: Arc<Debouncer<Vec<String>>>,
}

impl GroupReportManager {
    pub fn new(layout: RunLayout, model: Arc<Mutex<GroupModel>>) -> Self {
        Self::with_debounce(layout, model, GROUP_REPORT_DEBOUNCE)
    }

    pub fn with_debounce(
        layout: RunLayout,
        model: Arc<Mutex<GroupModel>>,
        delay: Duration,
    ) -> Self {
        Self {
            layout,
            model,
            debouncer: Arc::new(Debouncer::new(delay)),
        }
    }

    /// Arms (or resets) the debounce timer for the group identified by
    /// `suite_chain`.
    pub async fn schedule_write(&self, suite_chain: Vec<String>) {
        let layout = self.layout.clone();
        let model = self.model.clone();
        self.debouncer
            .schedule(suite_chain, move |chain| async move {
                flush_group(&layout, &model, &chain).await;
            })
            .await;
    }

    /// Cancels all pending timers, renders every group once, and writes
    /// them synchronously (spec.md §4.4 `finalize`).
    ///
    /// Renders every chain in the model, not just the ones with a timer
    /// still pending: a group's scheduled write may have already fired
    /// before a later mutation (e.g. `mark_unterminated_as_crashed`), and
    /// finalize must still produce a report reflecting the final state.
    pub async fn finalize(&self) {
        let dirty = self.debouncer.drain_pending().await;
        let all_chains = self
            .model
            .lock()
            .expect("group model mutex poisoned")
            .all_chains();

        let mut seen = std::collections::HashSet::new();
        for chain in dirty.into_iter().chain(all_chains) {
            if seen.insert(chain.clone()) {
                flush_group(&self.layout, &self.model, &chain).await;
            }
        }
    }
}

async fn flush_group(layout: &RunLayout, model: &Arc<Mutex<GroupModel>>, suite_chain: &[String]) {
    let snapshot = {
        let mut guard = model.lock().expect("group model mutex poisoned");
        guard.recompute_statuses();
        guard.find_group(suite_chain).cloned()
    };
    let Some(group) = snapshot else {
        tracing::debug!(chain = ?suite_chain, "flush requested for unknown group, skipping");
        return;
    };
    let content = render_group_report(suite_chain, &group);
    write_report_file(&layout.group_index_md(suite_chain), &content).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use threepio_ipc::TestStatus;

    #[tokio::test]
    async fn scheduled_write_lands_on_disk_after_debounce() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let model = Arc::new(Mutex::new(GroupModel::new()));
        model
            .lock()
            .unwrap()
            .record_test_completed(&["a".to_string()], "t1", TestStatus::Pass, None, None);

        let manager =
            GroupReportManager::with_debounce(layout.clone(), model, Duration::from_millis(10));
        manager.schedule_write(vec!["a".to_string()]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let content = tokio::fs::read_to_string(layout.group_index_md(&["a".to_string()]))
            .await
            .unwrap();
        assert!(content.contains("Group tests: 1"));
    }

    #[tokio::test]
    async fn finalize_flushes_pending_write_immediately() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let model = Arc::new(Mutex::new(GroupModel::new()));
        model
            .lock()
            .unwrap()
            .record_test_completed(&["a".to_string()], "t1", TestStatus::Pass, None, None);

        let manager =
            GroupReportManager::with_debounce(layout.clone(), model, Duration::from_secs(10));
        manager.schedule_write(vec!["a".to_string()]).await;
        manager.finalize().await;

        let content = tokio::fs::read_to_string(layout.group_index_md(&["a".to_string()]))
            .await
            .unwrap();
        assert!(content.contains("Group tests: 1"));
    }

    /// Regression test: a group mutated *after* its debounced write already
    /// fired (e.g. CHILD_CRASH marking it FAIL once the run is done) must
    /// still get a fresh report at finalize, not the stale pre-mutation one.
    #[tokio::test]
    async fn finalize_re_renders_groups_whose_debounce_already_fired() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let model = Arc::new(Mutex::new(GroupModel::new()));
        model.lock().unwrap().ensure_group(&["b".to_string()]);

        let manager =
            GroupReportManager::with_debounce(layout.clone(), model.clone(), Duration::from_millis(5));
        manager.schedule_write(vec!["b".to_string()]).await;
        // Let the debounce timer fire and write the "still running" report.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stale = tokio::fs::read_to_string(layout.group_index_md(&["b".to_string()]))
            .await
            .unwrap();
        assert!(stale.contains("RUNNING"));

        // Simulate CHILD_CRASH marking after the timer already fired, with
        // no further schedule_write call for "b".
        model
            .lock()
            .unwrap()
            .mark_unterminated_as_crashed("child terminated before completion");

        manager.finalize().await;

        let fresh = tokio::fs::read_to_string(layout.group_index_md(&["b".to_string()]))
            .await
            .unwrap();
        assert!(fresh.contains("FAIL"));
        assert!(fresh.contains("child terminated before completion"));
    }
}

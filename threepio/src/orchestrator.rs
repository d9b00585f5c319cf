// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C7: owns the run session end to end (spec.md §4.5).
//!
//! Creates the run directory, spawns the child with the IPC path wired
//! into its environment, wires the IPC reader into the report managers,
//! and handles cancellation and termination.

use std::sync::{Arc, Mutex as StdMutex};

use camino::Utf8PathBuf;
use chrono::Utc;
use threepio_ipc::{Event, IpcReadError, IpcReader};
use threepio_report::{
    GroupModel, GroupReportManager, GroupStatus, OutputStream, RunLayout, RunMeta,
    RunReportManager,
};
use tokio::sync::{mpsc, oneshot};

use crate::child::{forward_terminate, force_kill, spawn_child, tee_stream};
use crate::config::ThreepioConfig;
use crate::errors::{ExitCode, OrchestratorError};
use crate::session::{Session, SessionState};
use crate::signal::SignalHandler;

pub struct Orchestrator {
    config: ThreepioConfig,
}

impl Orchestrator {
    pub fn new(config: ThreepioConfig) -> Self {
        Self { config }
    }

    /// Runs `command` to completion under orchestration, returning the
    /// mapped exit code (spec.md §4.5 step 6).
    pub async fn run(
        &self,
        layout: RunLayout,
        run_id: String,
        command: Vec<String>,
    ) -> Result<ExitCode, OrchestratorError> {
        let mut session = Session::new();
        session.transition(SessionState::Starting);

        layout
            .create_run_dir()
            .map_err(|error| OrchestratorError::RunDirCreate {
                path: layout.run_dir().to_owned(),
                error,
            })?;

        let model = Arc::new(StdMutex::new(GroupModel::new()));
        let meta = RunMeta {
            run_id,
            command: command.clone(),
            started_at: Utc::now(),
            ended_at: None,
        };
        let group_reports = GroupReportManager::new(layout.clone(), model.clone());
        let run_report = RunReportManager::new(layout.clone(), model.clone(), meta);

        let mut child = spawn_child(&command, &layout.ipc_jsonl())?;
        session.transition(SessionState::Running);

        let output_log = Arc::new(tokio::sync::Mutex::new(
            tokio::fs::File::create(layout.output_log())
                .await
                .map_err(|error| OrchestratorError::RunDirCreate {
                    path: layout.output_log(),
                    error,
                })?,
        ));
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let tee_out = tokio::spawn(tee_stream(stdout, output_log.clone()));
        let tee_err = tokio::spawn(tee_stream(stderr, output_log));

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let reader = IpcReader::new(layout.ipc_jsonl())
            .with_poll_interval(self.config.ipc_poll_interval)
            .with_file_lost_retry(self.config.ipc_file_lost_retry);
        let reader_task = tokio::spawn(reader.run(event_tx, stop_rx));

        let mut signal_handler = SignalHandler::new()?;

        let exit_status = loop {
            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => {
                    self.handle_event(event, &model, &group_reports, &run_report).await;
                }
                result = child.wait() => {
                    break result;
                }
                Some(_signal) = signal_handler.recv() => {
                    tracing::info!("received interrupt, forwarding to child process group");
                    forward_terminate(&child);
                    let grace = self.config.terminate_grace_period;
                    match tokio::time::timeout(grace, child.wait()).await {
                        Ok(result) => break result,
                        Err(_elapsed) => {
                            break force_kill(&mut child).await;
                        }
                    }
                }
            }
        };

        session.transition(SessionState::Draining);

        let drain_deadline = tokio::time::sleep(self.config.drain_grace_period);
        tokio::pin!(drain_deadline);
        loop {
            tokio::select! {
                _ = &mut drain_deadline => break,
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event, &model, &group_reports, &run_report).await,
                        None => break,
                    }
                }
            }
        }
        let _ = stop_tx.send(());
        match reader_task.await {
            Ok(Ok(())) => {}
            Ok(Err(IpcReadError::FileLost { path })) => {
                tracing::warn!(%path, "IPC file lost; finalizing with partial data");
            }
            Ok(Err(error)) => tracing::warn!(%error, "IPC reader error"),
            Err(error) => tracing::warn!(%error, "IPC reader task panicked"),
        }
        while let Ok(event) = event_rx.try_recv() {
            self.handle_event(event, &model, &group_reports, &run_report).await;
        }
        let _ = tee_out.await;
        let _ = tee_err.await;

        session.transition(SessionState::Finalizing);

        let success = exit_status.as_ref().map(|s| s.success()).unwrap_or(false);
        if !success {
            model
                .lock()
                .expect("group model mutex poisoned")
                .mark_unterminated_as_crashed("child terminated before completion");
        }

        run_report.mark_ended();
        group_reports.finalize().await;
        run_report.finalize().await;

        session.transition(SessionState::Done);

        let any_group_failed = {
            let mut guard = model.lock().expect("group model mutex poisoned");
            guard.recompute_statuses();
            guard.top_level.iter().any(|g| g.status == GroupStatus::Fail)
        };

        Ok(if any_group_failed || !success {
            ExitCode::TestFailures
        } else {
            ExitCode::Success
        })
    }

    async fn handle_event(
        &self,
        event: Event,
        model: &Arc<StdMutex<GroupModel>>,
        group_reports: &GroupReportManager,
        run_report: &RunReportManager,
    ) {
        let dirty_chain = {
            let mut guard = model.lock().expect("group model mutex poisoned");
            apply_event(&mut guard, event)
        };
        if let Some(chain) = dirty_chain {
            group_reports.schedule_write(chain).await;
        }
        run_report.schedule_write().await;
    }
}

/// Applies a single IPC event to the model, returning the suite chain that
/// became dirty (if any) so the caller can schedule that group's report
/// for (debounced) re-rendering.
fn apply_event(model: &mut GroupModel, event: Event) -> Option<Vec<String>> {
    match event {
        Event::StdoutChunk { file_path, chunk } => {
            model.append_output(&file_path, OutputStream::Stdout, &chunk);
            Some(vec![file_path])
        }
        Event::StderrChunk { file_path, chunk } => {
            model.append_output(&file_path, OutputStream::Stderr, &chunk);
            Some(vec![file_path])
        }
        Event::TestFileResult { file_path, status } => {
            model.record_file_result(&file_path, status);
            Some(vec![file_path])
        }
        Event::GroupStarted { suite_chain } => {
            model.ensure_group(&suite_chain);
            Some(suite_chain)
        }
        Event::TestStarted {
            suite_chain,
            test_name,
        } => {
            model.record_test_started(&suite_chain, &test_name);
            Some(suite_chain)
        }
        Event::TestCompleted {
            suite_chain,
            test_name,
            status,
            error,
            duration_ms,
        } => {
            model.record_test_completed(&suite_chain, &test_name, status, duration_ms, error);
            Some(suite_chain)
        }
        Event::GroupCompleted {
            suite_chain,
            status,
            error,
        } => {
            model.close_group(&suite_chain, status, error);
            Some(suite_chain)
        }
    }
}

/// Computes the run id and layout for a fresh session rooted at
/// `root_dir` (spec.md §4.5 step 1).
pub fn new_run_layout(root_dir: &Utf8PathBuf) -> (String, RunLayout) {
    let mut rng = rand::rng();
    let run_id = threepio_report::generate_run_id(Utc::now(), &mut rng);
    let layout = RunLayout::new(root_dir, &run_id);
    (run_id, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// A config with short timeouts so these tests don't take real seconds
    /// to finish; the IPC poll interval in particular needs to be well
    /// under the test script's own runtime.
    fn fast_config() -> ThreepioConfig {
        ThreepioConfig {
            drain_grace_period: Duration::from_millis(300),
            terminate_grace_period: Duration::from_millis(300),
            ipc_poll_interval: Duration::from_millis(5),
            ipc_file_lost_retry: Duration::from_millis(100),
        }
    }

    /// Builds a `sh -c` command that appends one IPC event line to
    /// `$THREEPIO_IPC_PATH` and then exits with `exit_code`, standing in
    /// for an adapter without needing a real test-runner plugin.
    fn emit_event_command(json_payload: &str, exit_code: i32) -> Vec<String> {
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "printf '%s\\n' '{json_payload}' >> \"${}\"; exit {exit_code}",
                threepio_ipc::IPC_PATH_ENV_VAR
            ),
        ]
    }

    #[tokio::test]
    async fn successful_run_writes_reports_and_exits_success() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-1");
        let orchestrator = Orchestrator::new(fast_config());

        let command = emit_event_command(
            r#"{"eventType":"testFileResult","payload":{"filePath":"a","status":"PASS"}}"#,
            0,
        );

        let code = orchestrator
            .run(layout.clone(), "run-1".to_string(), command)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::Success);

        let run_report = tokio::fs::read_to_string(layout.test_run_md()).await.unwrap();
        assert!(run_report.contains("Test Run run-1"));
        assert!(run_report.contains("_No failures._"));

        let group_report = tokio::fs::read_to_string(layout.group_index_md(&["a".to_string()]))
            .await
            .unwrap();
        assert!(group_report.contains("Status: PASS"));
    }

    #[tokio::test]
    async fn crashed_child_marks_open_groups_failed_and_exits_with_failures() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "run-2");
        let orchestrator = Orchestrator::new(fast_config());

        // The child announces a group and then dies without ever closing
        // it (CHILD_CRASH, spec.md §7 / scenario 5).
        let command = emit_event_command(
            r#"{"eventType":"groupStarted","payload":{"suiteChain":["b"]}}"#,
            137,
        );

        let code = orchestrator
            .run(layout.clone(), "run-2".to_string(), command)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::TestFailures);

        let group_report = tokio::fs::read_to_string(layout.group_index_md(&["b".to_string()]))
            .await
            .unwrap();
        assert!(group_report.contains("Status: FAIL"));
        assert!(group_report.contains("child terminated before completion"));

        let run_report = tokio::fs::read_to_string(layout.test_run_md()).await.unwrap();
        assert!(!run_report.contains("_No failures._"));
    }
}

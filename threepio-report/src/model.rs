// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory hierarchical group model (C4, spec.md §3/§4.3).
//!
//! A [`GroupModel`] is a pure tree: the [`Run Session`](crate) owns the
//! top-level groups, and each [`Group`] owns its `subgroups`. There are no
//! back-pointers; the failures list in the run report is built by walking
//! the tree (spec.md §9 "Tree ownership without cycles").

use chrono::{DateTime, Utc};
use threepio_ipc::{ErrorDetails, TestStatus};

/// The status of a [`Group`], per invariant G-2: transitions only move
/// `Pending -> Running -> {Pass, Fail, Skip}`, never backwards once
/// terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Skip,
}

impl GroupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupStatus::Pass | GroupStatus::Fail | GroupStatus::Skip)
    }

    pub fn label(self) -> &'static str {
        match self {
            GroupStatus::Pending => "PENDING",
            GroupStatus::Running => "RUNNING",
            GroupStatus::Pass => "PASS",
            GroupStatus::Fail => "FAIL",
            GroupStatus::Skip => "SKIP",
        }
    }
}

impl From<TestStatus> for GroupStatus {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Pass => GroupStatus::Pass,
            TestStatus::Fail => GroupStatus::Fail,
            TestStatus::Skip => GroupStatus::Skip,
        }
    }
}

/// Which output stream a chunk of captured output came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A leaf test directly under a [`Group`] (invariant G-1: never a
/// descendant test, only ones this group directly contains).
#[derive(Clone, Debug, PartialEq)]
pub struct Test {
    pub name: String,
    /// `None` while the test is running (only a `TestStarted` event has
    /// been seen for it).
    pub status: Option<TestStatus>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
}

impl Test {
    fn started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            duration_ms: None,
            error_message: None,
            error_stack: None,
        }
    }
}

/// A node in the group tree: a test file, package, suite, or nested
/// subtest scope.
#[derive(Clone, Debug)]
pub struct Group {
    pub name: String,
    pub status: GroupStatus,
    pub tests: Vec<Test>,
    pub subgroups: Vec<Group>,
    pub stdout_log: String,
    pub stderr_log: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_details: Option<ErrorDetails>,
}

impl Group {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: GroupStatus::Running,
            tests: Vec::new(),
            subgroups: Vec::new(),
            stdout_log: String::new(),
            stderr_log: String::new(),
            started_at: Some(Utc::now()),
            ended_at: None,
            error_details: None,
        }
    }

    /// Direct test count for this group only — never includes descendant
    /// groups' tests (invariant G-1).
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn tests_passed_count(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| t.status == Some(TestStatus::Pass))
            .count()
    }

    fn close(&mut self, status: GroupStatus, error: Option<ErrorDetails>) {
        if self.status.is_terminal() {
            tracing::debug!(group = %self.name, "ignoring duplicate group-complete event");
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        self.error_details = error;
    }

    fn find_subgroup_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.subgroups.iter_mut().find(|g| g.name == name)
    }

    fn ensure_subgroup(&mut self, name: &str) -> &mut Group {
        if let Some(index) = self.subgroups.iter().position(|g| g.name == name) {
            &mut self.subgroups[index]
        } else {
            self.subgroups.push(Group::new(name));
            self.subgroups.last_mut().expect("just pushed")
        }
    }
}

/// The in-memory tree of all groups referenced so far during a run.
///
/// Not thread-safe by itself (spec.md §5): callers are expected to guard
/// mutation with a single logical mutex, as [`crate::session::RunSession`]
/// does.
#[derive(Debug, Default, Clone)]
pub struct GroupModel {
    pub top_level: Vec<Group>,
}

impl GroupModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks/creates nodes from the root for `suite_chain`, returning the
    /// leaf group. Creating a group sets `status = Running`,
    /// `started_at = now`. Idempotent for an already-existing chain.
    pub fn ensure_group(&mut self, suite_chain: &[String]) -> &mut Group {
        assert!(!suite_chain.is_empty(), "suite_chain must be non-empty");

        let root_index = match self.top_level.iter().position(|g| g.name == suite_chain[0]) {
            Some(index) => index,
            None => {
                self.top_level.push(Group::new(&suite_chain[0]));
                self.top_level.len() - 1
            }
        };
        let mut group = &mut self.top_level[root_index];
        for name in &suite_chain[1..] {
            group = group.ensure_subgroup(name);
        }
        group
    }

    pub fn find_group(&self, suite_chain: &[String]) -> Option<&Group> {
        let (first, rest) = suite_chain.split_first()?;
        let mut group = self.top_level.iter().find(|g| g.name == *first)?;
        for name in rest {
            group = group.subgroups.iter().find(|g| g.name == *name)?;
        }
        Some(group)
    }

    /// Records that a test under `suite_chain` has started.
    pub fn record_test_started(&mut self, suite_chain: &[String], test_name: &str) {
        let group = self.ensure_group(suite_chain);
        if !group.tests.iter().any(|t| t.name == test_name) {
            group.tests.push(Test::started(test_name));
        }
    }

    /// Records a test's completion. If the test was never seen starting,
    /// it's lazily created directly in its terminal state (some adapters
    /// emit only completion). A second completion for an already-terminal
    /// test is logged and ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn record_test_completed(
        &mut self,
        suite_chain: &[String],
        test_name: &str,
        status: TestStatus,
        duration_ms: Option<u64>,
        error: Option<ErrorDetails>,
    ) {
        let group = self.ensure_group(suite_chain);
        if let Some(existing) = group.tests.iter_mut().find(|t| t.name == test_name) {
            if existing.status.is_some() {
                tracing::debug!(test = %test_name, "ignoring duplicate test-complete event");
                return;
            }
            existing.status = Some(status);
            existing.duration_ms = duration_ms;
            existing.error_message = error.as_ref().map(|e| e.message.clone());
            existing.error_stack = error.and_then(|e| e.stack);
        } else {
            group.tests.push(Test {
                name: test_name.to_string(),
                status: Some(status),
                duration_ms,
                error_message: error.as_ref().map(|e| e.message.clone()),
                error_stack: error.and_then(|e| e.stack),
            });
        }
    }

    /// Appends output to the root group that owns `file_path` (C4
    /// `appendOutput`). Root groups correspond to test files, so the
    /// mapping is always a one-element suite chain.
    pub fn append_output(&mut self, file_path: &str, stream: OutputStream, chunk: &str) {
        let group = self.ensure_group(std::slice::from_ref(&file_path.to_string()));
        match stream {
            OutputStream::Stdout => group.stdout_log.push_str(chunk),
            OutputStream::Stderr => group.stderr_log.push_str(chunk),
        }
    }

    /// Records a `testFileResult` event: the root group for `file_path` is
    /// closed with the given terminal status.
    pub fn record_file_result(&mut self, file_path: &str, status: TestStatus) {
        let group = self.ensure_group(std::slice::from_ref(&file_path.to_string()));
        group.close(status.into(), None);
    }

    /// Sets a group's terminal status, per spec.md's `closeGroup`
    /// operation. Does not itself recompute ancestors — that happens
    /// lazily in [`Self::recompute_statuses`], called by the report
    /// managers right before a flush.
    pub fn close_group(
        &mut self,
        suite_chain: &[String],
        status: TestStatus,
        error: Option<ErrorDetails>,
    ) {
        let group = self.ensure_group(suite_chain);
        group.close(status.into(), error);
    }

    /// Recomputes aggregate statuses for every group bottom-up, per
    /// invariant G-3. A group with children (tests or subgroups) derives
    /// its status from them; a childless group keeps whatever status an
    /// explicit close event gave it.
    pub fn recompute_statuses(&mut self) {
        for group in &mut self.top_level {
            recompute_group(group);
        }
    }

    /// Walks the tree collecting every group whose final status is FAIL,
    /// alongside the suite chain that locates it (used to build the
    /// run report's failures section).
    pub fn failing_groups(&self) -> Vec<(Vec<String>, &Group)> {
        let mut out = Vec::new();
        for group in &self.top_level {
            collect_failing(&[], group, &mut out);
        }
        out
    }

    /// CHILD_CRASH policy (spec.md §7): marks every non-terminal group FAIL
    /// with a synthetic error, for when the child exits without completing.
    pub fn mark_unterminated_as_crashed(&mut self, message: &str) {
        for group in &mut self.top_level {
            mark_crashed(group, message);
        }
    }

    /// Every suite chain for a group that exists anywhere in the tree.
    ///
    /// Used by [`crate::group_report::GroupReportManager::finalize`] to
    /// re-render every group's report at finalize time, not just the ones
    /// with a debounce timer still pending — a group whose timer already
    /// fired before a later mutation (e.g. CHILD_CRASH marking it FAIL)
    /// would otherwise keep a stale report on disk.
    pub fn all_chains(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        for group in &self.top_level {
            collect_chains(&[], group, &mut out);
        }
        out
    }
}

fn recompute_group(group: &mut Group) -> GroupStatus {
    if group.tests.is_empty() && group.subgroups.is_empty() {
        return group.status;
    }

    let mut subgroup_statuses = Vec::with_capacity(group.subgroups.len());
    for subgroup in &mut group.subgroups {
        subgroup_statuses.push(recompute_group(subgroup));
    }

    let any_test_fail = group.tests.iter().any(|t| t.status == Some(TestStatus::Fail));
    let any_subgroup_fail = subgroup_statuses.iter().any(|s| *s == GroupStatus::Fail);

    let all_tests_terminal = group.tests.iter().all(|t| t.status.is_some());
    let all_subgroups_terminal = subgroup_statuses.iter().all(|s| s.is_terminal());

    let computed = if any_test_fail || any_subgroup_fail {
        GroupStatus::Fail
    } else if !all_tests_terminal || !all_subgroups_terminal {
        // Children still running: preserve whatever non-terminal status is
        // already set rather than guessing.
        if group.status.is_terminal() {
            group.status
        } else {
            GroupStatus::Running
        }
    } else {
        let non_skip_tests = group
            .tests
            .iter()
            .filter(|t| t.status != Some(TestStatus::Skip))
            .count();
        let non_skip_subgroups = subgroup_statuses
            .iter()
            .filter(|s| **s != GroupStatus::Skip)
            .count();
        if non_skip_tests + non_skip_subgroups == 0 {
            GroupStatus::Skip
        } else {
            GroupStatus::Pass
        }
    };

    if computed != group.status {
        group.status = computed;
        if computed.is_terminal() && group.ended_at.is_none() {
            group.ended_at = Some(Utc::now());
        }
    }
    group.status
}

fn collect_failing<'a>(
    prefix: &[String],
    group: &'a Group,
    out: &mut Vec<(Vec<String>, &'a Group)>,
) {
    let mut chain = prefix.to_vec();
    chain.push(group.name.clone());
    if group.status == GroupStatus::Fail {
        out.push((chain.clone(), group));
    }
    for subgroup in &group.subgroups {
        collect_failing(&chain, subgroup, out);
    }
}

fn collect_chains(prefix: &[String], group: &Group, out: &mut Vec<Vec<String>>) {
    let mut chain = prefix.to_vec();
    chain.push(group.name.clone());
    out.push(chain.clone());
    for subgroup in &group.subgroups {
        collect_chains(&chain, subgroup, out);
    }
}

fn mark_crashed(group: &mut Group, message: &str) {
    if !group.status.is_terminal() {
        group.close(GroupStatus::Fail, Some(ErrorDetails::synthetic(message)));
    }
    for subgroup in &mut group.subgroups {
        mark_crashed(subgroup, message);
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk directory scheme for a run session (C9, spec.md §6).
//!
//! Everything under `.3pio/runs/<runId>/` is computed here so that the
//! report managers, the orchestrator, and any user-facing message agree on
//! exactly one scheme.

use camino::{Utf8Path, Utf8PathBuf};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::sanitize::sanitize;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "deft", "eager", "fleet", "gentle", "hazy", "idle", "jolly", "keen",
    "lively", "mellow", "nimble", "opal", "plucky", "quiet", "ruddy", "spry", "tidy",
];

const NOUNS: &[&str] = &[
    "beacon", "canyon", "delta", "ember", "falcon", "grove", "harbor", "inlet", "juniper",
    "kestrel", "lantern", "meadow", "nebula", "orbit", "pebble", "quartz", "ridge", "sable",
    "thicket", "willow",
];

/// Generates a run id of the form `<timestamp>-<slug>` (spec.md §4.5 step
/// 1), using the given RNG for the slug so tests can supply a seeded one.
pub fn generate_run_id(now: chrono::DateTime<chrono::Utc>, rng: &mut impl Rng) -> String {
    let timestamp = now.format("%Y%m%dT%H%M%S%.3fZ");
    let adjective = ADJECTIVES.choose(rng).expect("non-empty list");
    let noun = NOUNS.choose(rng).expect("non-empty list");
    format!("{timestamp}-{adjective}-{noun}")
}

/// All persisted paths for a single run session, rooted under
/// `<root_dir>/.3pio/runs/<run_id>/`.
#[derive(Clone, Debug)]
pub struct RunLayout {
    run_dir: Utf8PathBuf,
}

impl RunLayout {
    pub fn new(root_dir: impl AsRef<Utf8Path>, run_id: &str) -> Self {
        Self {
            run_dir: root_dir.as_ref().join(".3pio").join("runs").join(run_id),
        }
    }

    pub fn run_dir(&self) -> &Utf8Path {
        &self.run_dir
    }

    pub fn test_run_md(&self) -> Utf8PathBuf {
        self.run_dir.join("test-run.md")
    }

    pub fn ipc_jsonl(&self) -> Utf8PathBuf {
        self.run_dir.join("ipc.jsonl")
    }

    pub fn output_log(&self) -> Utf8PathBuf {
        self.run_dir.join("output.log")
    }

    pub fn debug_log(&self) -> Utf8PathBuf {
        self.run_dir.join("debug.log")
    }

    /// The directory for the group identified by `suite_chain`, nesting
    /// one `groups/<sanitized>/` level per chain element, so subgroups
    /// recurse under `groups/<sanitized>/groups/…` as spec.md §4.4 states.
    pub fn group_dir(&self, suite_chain: &[String]) -> Utf8PathBuf {
        let mut dir = self.run_dir.clone();
        for name in suite_chain {
            dir = dir.join("groups").join(sanitize(name));
        }
        dir
    }

    pub fn group_index_md(&self, suite_chain: &[String]) -> Utf8PathBuf {
        self.group_dir(suite_chain).join("index.md")
    }

    /// Creates the run directory and its top-level `groups/` parent. Group
    /// subdirectories are created lazily as groups are flushed.
    pub fn create_run_dir(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.run_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn group_dirs_nest_one_level_per_chain_segment() {
        let layout = RunLayout::new("/root", "20260101T000000-amber-beacon");
        let chain = vec!["TestMain".to_string(), "Sub".to_string()];
        let dir = layout.group_dir(&chain);
        assert_eq!(
            dir,
            Utf8PathBuf::from(
                "/root/.3pio/runs/20260101T000000-amber-beacon/groups/testmain/groups/sub"
            )
        );
    }

    #[test]
    fn run_id_is_deterministic_with_seeded_rng() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-07-27T12:00:00Z")
            .unwrap()
            .to_utc();
        let mut rng = StdRng::seed_from_u64(42);
        let id = generate_run_id(now, &mut rng);
        assert!(id.starts_with("20260727T120000"));
        assert!(id.contains('-'));
    }
}

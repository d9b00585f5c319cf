// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single path-sanitization function shared by the report directory
//! creator and any user-facing "see report at …" message (spec.md §4.6).
//!
//! There is exactly one sanitizer in the system; nothing else in this
//! crate should hand-roll its own character substitution.

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Maps a group name (typically a file path or suite name) to a
/// filesystem-safe directory fragment.
///
/// Applies, in order:
/// 1. lowercase
/// 2. replace `/` and `\` with `_`
/// 3. replace `.` with `_`
/// 4. replace `-` with `_`
/// 5. replace any remaining filesystem-invalid character with `_`
/// 6. wrap reserved device names (`con`, `prn`, `nul`, `com1`..`9`, …) with
///    leading and trailing `_`
/// 7. collapse runs of `_` to a single `_`
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    let mut s = name.to_lowercase();
    s = s.replace(['/', '\\'], "_");
    s = s.replace('.', "_");
    s = s.replace('-', "_");
    s = s
        .chars()
        .map(|c| if is_fs_invalid(c) { '_' } else { c })
        .collect();

    if RESERVED_DEVICE_NAMES.contains(&s.as_str()) {
        s = format!("_{s}_");
    }

    collapse_underscores(&s)
}

fn is_fs_invalid(c: char) -> bool {
    matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0') || c.is_control()
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    out
}

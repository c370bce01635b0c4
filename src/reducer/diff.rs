//! Line-based unified diff
//!
//! Hunks carry a fixed number of context lines and follow the classic
//! unified format:
//!
//! ```text
//! --- previous
//! +++ current
//! @@ -1,3 +1,4 @@
//!  unchanged
//! -removed
//! +added
//! ```
//!
//! Every emitted line ends with `\n`. Identical inputs produce `""`.

use similar::TextDiff;
use std::fmt::Write;

/// Unified diff of `old` against `new`, labelled `from` / `to`.
///
/// The header is only written when there is at least one hunk. A last line
/// without a trailing newline gets one, with no "No newline" marker.
pub fn unified_diff(old: &str, new: &str, from: &str, to: &str, context: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut udiff = diff.unified_diff();
    udiff.context_radius(context);

    let mut out = String::new();
    for hunk in udiff.iter_hunks() {
        if out.is_empty() {
            let _ = writeln!(out, "--- {}", from);
            let _ = writeln!(out, "+++ {}", to);
        }
        let _ = writeln!(out, "{}", hunk.header());
        for change in hunk.iter_changes() {
            let _ = write!(out, "{}{}", change.tag(), change.value());
            if change.missing_newline() {
                out.push('\n');
            }
        }
    }
    out
}

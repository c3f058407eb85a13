//! Parsing of `git diff --unified=0` output
//!
//! Zero-context diffs keep the `@@` hunk headers authoritative: the `+`-side
//! start/count describes exactly the lines a branch adds or rewrites, and
//! `-`-prefixed body lines are exactly the removed content. Both parsers are
//! pure so the format assumptions stay pinned down by literal fixtures.

use regex::Regex;
use std::sync::LazyLock;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

/// An inclusive range of line numbers on the new (`+`) side of a diff.
pub type LineRange = (u32, u32);

/// A line removed by a diff, attributed to the file it was removed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedLine {
    pub file: String,
    pub content: String,
}

/// Extract the `+`-side line ranges from every hunk header. A hunk that adds
/// zero lines (pure deletion, `+N,0`) is skipped; a header without an
/// explicit count covers one line.
pub fn parse_added_ranges(diff: &str) -> Vec<LineRange> {
    let mut ranges = Vec::new();

    for line in diff.lines() {
        let Some(caps) = HUNK_HEADER.captures(line) else {
            continue;
        };
        let start: u32 = caps[1].parse().unwrap_or(0);
        let count: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse().unwrap_or(1))
            .unwrap_or(1);
        if count == 0 {
            continue;
        }
        ranges.push((start, start + count - 1));
    }

    ranges
}

/// Two inclusive ranges intersect iff `a <= d && c <= b`.
pub fn ranges_intersect(left: LineRange, right: LineRange) -> bool {
    left.0 <= right.1 && right.0 <= left.1
}

/// Collect the removed (`-`) body lines of a diff, tagged with the file they
/// came from. File headers (`---`/`+++`) are not content.
pub fn parse_removed_lines(diff: &str) -> Vec<RemovedLine> {
    let mut removed = Vec::new();
    let mut current_file = String::new();

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("--- ") {
            current_file = rest
                .trim()
                .strip_prefix("a/")
                .unwrap_or(rest.trim())
                .to_string();
            continue;
        }
        if line.starts_with("+++") || line.starts_with("diff --git") {
            continue;
        }
        if let Some(content) = line.strip_prefix('-') {
            removed.push(RemovedLine {
                file: current_file.clone(),
                content: content.to_string(),
            });
        }
    }

    removed
}

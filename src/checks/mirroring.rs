//! Mirroring drift check
//!
//! Some directory pairs must evolve together, e.g. a packaged template copy and
//! the live directory it mirrors. A branch that touches one side of a pair
//! without the corresponding path on the other side gets a warning naming
//! the missing counterpart. Pure data transformation over modified-file
//! lists; no version-control access.

use super::{
    BranchCheckResult, BranchInfo, CheckFinding, CheckResult, CheckVerdict, MirrorDirection,
    Severity, UnmirroredChange,
};
use crate::config::MirrorPair;
use std::time::Instant;

pub const CHECK_NAME: &str = "mirroring";

pub fn run(branches: &[BranchInfo], pairs: &[MirrorPair]) -> CheckResult {
    let started = Instant::now();
    let mut branch_results = Vec::new();

    for branch in branches {
        let unmirrored = unmirrored_changes(branch, pairs);
        let findings: Vec<CheckFinding> = unmirrored
            .iter()
            .map(|change| {
                let (touched, missing) = match change.direction {
                    MirrorDirection::SourceOnly => (&change.source_file, &change.target_file),
                    MirrorDirection::TargetOnly => (&change.target_file, &change.source_file),
                };
                CheckFinding::new(
                    CHECK_NAME,
                    Severity::Warning,
                    format!("`{touched}` changed without its mirror `{missing}`"),
                )
                .for_item(branch.item_id)
                .at_file(touched.clone())
            })
            .collect();

        let verdict = if findings.is_empty() {
            CheckVerdict::Pass
        } else {
            CheckVerdict::Warn
        };

        branch_results.push(BranchCheckResult {
            item_id: branch.item_id,
            verdict,
            findings,
        });
    }

    let mut result = CheckResult {
        name: CHECK_NAME.to_string(),
        passed: true,
        branch_results,
        batch_findings: Vec::new(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    result.derive_passed();
    result
}

/// Find every file under one side of a pair whose counterpart path is not in
/// the same branch's modified set.
pub fn unmirrored_changes(branch: &BranchInfo, pairs: &[MirrorPair]) -> Vec<UnmirroredChange> {
    let mut unmirrored = Vec::new();

    for file in &branch.files_modified {
        for pair in pairs {
            if let Some(suffix) = strip_dir_prefix(file, &pair.source) {
                let counterpart = join_dir(&pair.target, suffix);
                if !branch.files_modified.iter().any(|f| f == &counterpart) {
                    unmirrored.push(UnmirroredChange {
                        source_file: file.clone(),
                        target_file: counterpart,
                        direction: MirrorDirection::SourceOnly,
                        item_id: branch.item_id,
                    });
                }
            } else if let Some(suffix) = strip_dir_prefix(file, &pair.target) {
                let counterpart = join_dir(&pair.source, suffix);
                if !branch.files_modified.iter().any(|f| f == &counterpart) {
                    unmirrored.push(UnmirroredChange {
                        source_file: counterpart,
                        target_file: file.clone(),
                        direction: MirrorDirection::TargetOnly,
                        item_id: branch.item_id,
                    });
                }
            }
        }
    }

    unmirrored
}

/// `strip_dir_prefix("a/b/c.md", "a/b")` is `Some("c.md")`; a prefix only
/// matches on a directory boundary, so `"a/bc.md"` does not match `"a/b"`.
fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    let dir = dir.trim_end_matches('/');
    path.strip_prefix(dir)?.strip_prefix('/')
}

fn join_dir(dir: &str, suffix: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(item_id: u64, files: &[&str]) -> BranchInfo {
        BranchInfo {
            item_id,
            title: format!("Item #{item_id}"),
            branch_name: format!("feature/{item_id}-test"),
            worktree_path: None,
            external_ref_id: None,
            files_modified: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn pair() -> Vec<MirrorPair> {
        vec![MirrorPair {
            source: "templates/live".to_string(),
            target: "packaged/templates".to_string(),
        }]
    }

    #[test]
    fn test_source_only_change_warns_naming_counterpart() {
        let result = run(&[branch(1, &["templates/live/x.md"])], &pair());

        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Warn);
        let findings = &result.branch_results[0].findings;
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("packaged/templates/x.md"));
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_both_sides_modified_passes() {
        let result = run(
            &[branch(1, &["templates/live/x.md", "packaged/templates/x.md"])],
            &pair(),
        );

        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
        assert!(result.branch_results[0].findings.is_empty());
        assert!(result.passed);
    }

    #[test]
    fn test_target_only_change_warns_symmetrically() {
        let unmirrored = unmirrored_changes(&branch(2, &["packaged/templates/y.md"]), &pair());

        assert_eq!(unmirrored.len(), 1);
        assert_eq!(unmirrored[0].direction, MirrorDirection::TargetOnly);
        assert_eq!(unmirrored[0].source_file, "templates/live/y.md");
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let result = run(&[branch(3, &["src/main.rs", "docs/readme.md"])], &pair());
        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
    }

    #[test]
    fn test_prefix_matches_only_on_directory_boundary() {
        // "templates/liveX/…" is not inside "templates/live"
        let result = run(&[branch(4, &["templates/liveX/z.md"])], &pair());
        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
    }

    #[test]
    fn test_nested_suffix_is_preserved() {
        let unmirrored =
            unmirrored_changes(&branch(5, &["templates/live/email/welcome.html"]), &pair());
        assert_eq!(
            unmirrored[0].target_file,
            "packaged/templates/email/welcome.html"
        );
    }

    #[test]
    fn test_mirroring_never_fails_a_branch() {
        let result = run(
            &[branch(
                6,
                &[
                    "templates/live/a.md",
                    "templates/live/b.md",
                    "templates/live/c.md",
                ],
            )],
            &pair(),
        );
        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Warn);
        // warnings don't flip `passed`; only FAIL verdicts and error findings do
        assert!(result.passed);
    }
}

//! Cross-branch overlap detection
//!
//! Unions every branch's modified-file list into a file→items map; files
//! touched by two or more items are overlaps. Each overlap is classified by
//! pulling the items' changed line ranges from zero-context diff hunks:
//! intersecting ranges mean the edits collide (`conflicting`), disjoint
//! ranges mean they merely share a file (`additive`). Either way the result
//! is a warning for human review, never a hard failure.

use super::{
    BranchCheckResult, BranchInfo, CheckFinding, CheckResult, CheckVerdict, FileOverlap,
    OverlapKind, Severity,
};
use crate::external::diff::{parse_added_ranges, ranges_intersect, LineRange};
use crate::external::git::GitClient;
use std::collections::BTreeMap;
use std::time::Instant;

pub const CHECK_NAME: &str = "overlap";

pub struct OverlapDetector<'a> {
    git: &'a GitClient,
    remote: String,
    trunk: String,
}

impl<'a> OverlapDetector<'a> {
    pub fn new(git: &'a GitClient, remote: &str, trunk: &str) -> Self {
        Self {
            git,
            remote: remote.to_string(),
            trunk: trunk.to_string(),
        }
    }

    pub async fn run(&self, branches: &[BranchInfo]) -> CheckResult {
        let started = Instant::now();

        let overlaps = self.detect(branches).await;

        let mut batch_findings = Vec::new();
        let mut per_item: BTreeMap<u64, Vec<CheckFinding>> = BTreeMap::new();

        for overlap in &overlaps {
            let item_list = overlap
                .items
                .iter()
                .map(|id| format!("#{id}"))
                .collect::<Vec<_>>()
                .join(", ");
            batch_findings.push(
                CheckFinding::new(
                    CHECK_NAME,
                    Severity::Warning,
                    format!(
                        "`{}` modified by {} ({} overlap)",
                        overlap.file, item_list, overlap.kind
                    ),
                )
                .at_file(overlap.file.clone()),
            );

            for &item_id in &overlap.items {
                let others = overlap
                    .items
                    .iter()
                    .filter(|&&id| id != item_id)
                    .map(|id| format!("#{id}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                per_item.entry(item_id).or_default().push(
                    CheckFinding::new(
                        CHECK_NAME,
                        Severity::Warning,
                        format!(
                            "`{}` also modified by {} ({} overlap)",
                            overlap.file, others, overlap.kind
                        ),
                    )
                    .for_item(item_id)
                    .at_file(overlap.file.clone()),
                );
            }
        }

        let branch_results = branches
            .iter()
            .map(|branch| {
                let findings = per_item.remove(&branch.item_id).unwrap_or_default();
                let verdict = if findings.is_empty() {
                    CheckVerdict::Pass
                } else {
                    CheckVerdict::Warn
                };
                BranchCheckResult {
                    item_id: branch.item_id,
                    verdict,
                    findings,
                }
            })
            .collect();

        let mut result = CheckResult {
            name: CHECK_NAME.to_string(),
            passed: true,
            branch_results,
            batch_findings,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        result.derive_passed();
        result
    }

    /// Build the file→items map and classify every file touched by 2+ items.
    pub async fn detect(&self, branches: &[BranchInfo]) -> Vec<FileOverlap> {
        let mut by_file: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for branch in branches {
            for file in &branch.files_modified {
                let items = by_file.entry(file.clone()).or_default();
                if !items.contains(&branch.item_id) {
                    items.push(branch.item_id);
                }
            }
        }

        let mut overlaps = Vec::new();
        for (file, items) in by_file {
            if items.len() < 2 {
                continue;
            }

            let mut range_sets = Vec::new();
            for &item_id in &items {
                let branch = branches
                    .iter()
                    .find(|b| b.item_id == item_id)
                    .expect("overlap item comes from the branch list");
                range_sets.push(self.changed_ranges(branch, &file).await);
            }

            overlaps.push(FileOverlap {
                kind: classify(&range_sets),
                file,
                items,
            });
        }

        overlaps
    }

    /// The `+`-side line ranges an item changed in one file. A diff failure
    /// degrades to no ranges; the overlap is still reported, just without
    /// line evidence against this item.
    async fn changed_ranges(&self, branch: &BranchInfo, file: &str) -> Vec<LineRange> {
        let (cwd, reference) = branch.diff_locator(&self.remote);
        match self
            .git
            .diff_unified_zero(&self.trunk, &reference, Some(file), cwd.map(|p| p.as_path()))
            .await
        {
            Ok(diff) => parse_added_ranges(&diff),
            Err(e) => {
                tracing::warn!(item = branch.item_id, file, error = %e, "Hunk extraction failed");
                Vec::new()
            }
        }
    }
}

/// An overlap is conflicting iff any two items' range sets intersect.
pub fn classify(range_sets: &[Vec<LineRange>]) -> OverlapKind {
    for (i, left) in range_sets.iter().enumerate() {
        for right in range_sets.iter().skip(i + 1) {
            let collides = left
                .iter()
                .any(|&a| right.iter().any(|&b| ranges_intersect(a, b)));
            if collides {
                return OverlapKind::Conflicting;
            }
        }
    }
    OverlapKind::Additive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::command::mock::ScriptedExecutor;
    use std::sync::Arc;

    fn branch(item_id: u64, files: &[&str]) -> BranchInfo {
        BranchInfo {
            item_id,
            title: format!("Item #{item_id}"),
            branch_name: format!("feature/{item_id}-work"),
            worktree_path: None,
            external_ref_id: None,
            files_modified: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_classify_disjoint_ranges_is_additive() {
        assert_eq!(
            classify(&[vec![(1, 5)], vec![(6, 10)]]),
            OverlapKind::Additive
        );
    }

    #[test]
    fn test_classify_intersecting_ranges_is_conflicting() {
        assert_eq!(
            classify(&[vec![(1, 5)], vec![(3, 8)]]),
            OverlapKind::Conflicting
        );
    }

    #[test]
    fn test_classify_touching_ranges_is_conflicting() {
        // inclusive bounds: [1,5] and [5,10] share line 5
        assert_eq!(
            classify(&[vec![(1, 5)], vec![(5, 10)]]),
            OverlapKind::Conflicting
        );
    }

    #[test]
    fn test_classify_without_line_evidence_is_additive() {
        assert_eq!(classify(&[vec![], vec![]]), OverlapKind::Additive);
    }

    #[tokio::test]
    async fn test_disjoint_file_sets_produce_no_overlaps() {
        let executor = ScriptedExecutor::new();
        let git = GitClient::new(Arc::new(executor));
        let detector = OverlapDetector::new(&git, "origin", "main");

        let result = detector
            .run(&[branch(1, &["a.ts"]), branch(2, &["b.ts"]), branch(3, &["c.ts"])])
            .await;

        assert!(result.batch_findings.is_empty());
        assert!(result
            .branch_results
            .iter()
            .all(|r| r.verdict == CheckVerdict::Pass));
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_shared_file_disjoint_lines_is_additive_warn() {
        let executor = ScriptedExecutor::new()
            .on_stdout(
                "git diff --unified=0 main...origin/feature/1-work -- shared.ts",
                "--- a/shared.ts\n+++ b/shared.ts\n@@ -1,5 +1,5 @@\n+edit\n",
            )
            .on_stdout(
                "git diff --unified=0 main...origin/feature/2-work -- shared.ts",
                "--- a/shared.ts\n+++ b/shared.ts\n@@ -6,5 +6,5 @@\n+edit\n",
            );
        let git = GitClient::new(Arc::new(executor));
        let detector = OverlapDetector::new(&git, "origin", "main");

        let branches = [
            branch(1, &["shared.ts"]),
            branch(2, &["shared.ts"]),
            branch(3, &["unique.ts"]),
        ];
        let result = detector.run(&branches).await;

        assert_eq!(result.batch_findings.len(), 1);
        let message = &result.batch_findings[0].message;
        assert!(message.contains("#1, #2"));
        assert!(message.contains("additive"));

        assert_eq!(result.branch_results[0].verdict, CheckVerdict::Warn);
        assert_eq!(result.branch_results[1].verdict, CheckVerdict::Warn);
        assert_eq!(result.branch_results[2].verdict, CheckVerdict::Pass);
        // other items are named in each per-branch finding
        assert!(result.branch_results[0].findings[0].message.contains("#2"));
    }

    #[tokio::test]
    async fn test_overlapping_lines_classify_as_conflicting() {
        let executor = ScriptedExecutor::new()
            .on_stdout(
                "git diff --unified=0 main...origin/feature/1-work -- shared.ts",
                "@@ -1,5 +1,5 @@\n",
            )
            .on_stdout(
                "git diff --unified=0 main...origin/feature/2-work -- shared.ts",
                "@@ -3,6 +3,6 @@\n",
            );
        let git = GitClient::new(Arc::new(executor));
        let detector = OverlapDetector::new(&git, "origin", "main");

        let result = detector
            .run(&[branch(1, &["shared.ts"]), branch(2, &["shared.ts"])])
            .await;

        assert!(result.batch_findings[0].message.contains("conflicting"));
        // a conflicting overlap is still WARN, never FAIL
        assert!(result
            .branch_results
            .iter()
            .all(|r| r.verdict == CheckVerdict::Warn));
        assert!(result.passed);
    }
}

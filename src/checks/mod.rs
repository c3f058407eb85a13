//! Shared types for merge-readiness checks
//!
//! Verdicts are closed enums with a derived total order so "worst verdict"
//! reduction is `Ord::max` rather than ad hoc comparisons scattered across
//! components.

pub mod combined;
pub mod mirroring;
pub mod overlap;
pub mod residual;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One check's verdict for one work item. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckVerdict {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CheckVerdict::Pass => "PASS",
            CheckVerdict::Warn => "WARN",
            CheckVerdict::Fail => "FAIL",
        };
        write!(f, "{label}")
    }
}

/// The single worst-case readiness signal for the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BatchVerdict {
    Ready,
    NeedsAttention,
    Blocked,
}

impl BatchVerdict {
    /// Process exit code contract: READY → 0, NEEDS_ATTENTION → 1,
    /// BLOCKED → 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchVerdict::Ready => 0,
            BatchVerdict::NeedsAttention => 1,
            BatchVerdict::Blocked => 2,
        }
    }
}

impl std::fmt::Display for BatchVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BatchVerdict::Ready => "READY",
            BatchVerdict::NeedsAttention => "NEEDS_ATTENTION",
            BatchVerdict::Blocked => "BLOCKED",
        };
        write!(f, "{label}")
    }
}

/// One resolved work item: its branch and the files it modifies relative to
/// trunk. Immutable once the resolver builds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub item_id: u64,
    pub title: String,
    pub branch_name: String,
    pub worktree_path: Option<PathBuf>,
    pub external_ref_id: Option<u64>,
    pub files_modified: Vec<String>,
}

impl BranchInfo {
    /// Where to run diffs for this branch: inside its worktree against HEAD
    /// when one exists (freshest, no network), otherwise at the repo root
    /// against the remote-tracking ref.
    pub fn diff_locator(&self, remote: &str) -> (Option<&PathBuf>, String) {
        match &self.worktree_path {
            Some(path) => (Some(path), "HEAD".to_string()),
            None => (None, format!("{remote}/{}", self.branch_name)),
        }
    }
}

/// The atomic unit of output from any check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFinding {
    pub check_name: String,
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub item_id: Option<u64>,
}

impl CheckFinding {
    pub fn new(check_name: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            severity,
            message: message.into(),
            file: None,
            line: None,
            item_id: None,
        }
    }

    pub fn for_item(mut self, item_id: u64) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn at_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// One check's view of one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCheckResult {
    pub item_id: u64,
    pub verdict: CheckVerdict,
    pub findings: Vec<CheckFinding>,
}

/// One check's view of the whole batch, including findings not attributable
/// to a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub branch_results: Vec<BranchCheckResult>,
    pub batch_findings: Vec<CheckFinding>,
    pub duration_ms: u64,
}

impl CheckResult {
    /// A check passes when no item failed and no batch-level error exists.
    pub fn derive_passed(&mut self) {
        self.passed = self
            .branch_results
            .iter()
            .all(|r| r.verdict != CheckVerdict::Fail)
            && self
                .batch_findings
                .iter()
                .all(|f| f.severity != Severity::Error);
    }
}

/// How two items' edits to the same file relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapKind {
    Additive,
    Conflicting,
}

impl std::fmt::Display for OverlapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapKind::Additive => write!(f, "additive"),
            OverlapKind::Conflicting => write!(f, "conflicting"),
        }
    }
}

/// A file modified by two or more items in the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOverlap {
    pub file: String,
    pub items: Vec<u64>,
    pub kind: OverlapKind,
}

/// A literal string pulled from a removed diff line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPattern {
    pub pattern: String,
    pub source_file: String,
    pub item_id: u64,
}

/// A leftover occurrence of a removed pattern elsewhere in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualMatch {
    pub pattern: String,
    pub file: String,
    pub line: u32,
    pub content: String,
    pub item_id: u64,
}

/// Which side of a mirror pair a change landed on without its counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MirrorDirection {
    SourceOnly,
    TargetOnly,
}

/// A change under one side of a mirror pair with no matching change on the
/// other side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmirroredChange {
    pub source_file: String,
    pub target_file: String,
    pub direction: MirrorDirection,
    pub item_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_total_order() {
        assert!(CheckVerdict::Pass < CheckVerdict::Warn);
        assert!(CheckVerdict::Warn < CheckVerdict::Fail);
        assert_eq!(
            CheckVerdict::Pass.max(CheckVerdict::Fail),
            CheckVerdict::Fail
        );
    }

    #[test]
    fn test_batch_verdict_exit_codes() {
        assert_eq!(BatchVerdict::Ready.exit_code(), 0);
        assert_eq!(BatchVerdict::NeedsAttention.exit_code(), 1);
        assert_eq!(BatchVerdict::Blocked.exit_code(), 2);
    }

    #[test]
    fn test_diff_locator_prefers_worktree() {
        let with_worktree = BranchInfo {
            item_id: 1,
            title: "t".to_string(),
            branch_name: "feature/1-x".to_string(),
            worktree_path: Some(PathBuf::from("/repo/.worktrees/one")),
            external_ref_id: None,
            files_modified: vec![],
        };
        let (cwd, reference) = with_worktree.diff_locator("origin");
        assert!(cwd.is_some());
        assert_eq!(reference, "HEAD");

        let remote_only = BranchInfo {
            worktree_path: None,
            ..with_worktree
        };
        let (cwd, reference) = remote_only.diff_locator("origin");
        assert!(cwd.is_none());
        assert_eq!(reference, "origin/feature/1-x");
    }

    #[test]
    fn test_derive_passed_on_error_batch_finding() {
        let mut result = CheckResult {
            name: "combined-integration".to_string(),
            passed: true,
            branch_results: vec![],
            batch_findings: vec![CheckFinding::new(
                "combined-integration",
                Severity::Error,
                "could not create integration branch",
            )],
            duration_ms: 0,
        };
        result.derive_passed();
        assert!(!result.passed);
    }
}

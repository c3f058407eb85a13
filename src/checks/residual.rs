//! Residual pattern scan
//!
//! A branch that removes code may leave copies of the removed fragment
//! behind elsewhere in the tree, the signature of an incomplete migration.
//! This check extracts literal removed lines from each branch's diff,
//! discards noise, and greps the trunk tree for leftovers outside the
//! branch's own modified files.

use super::{
    BranchCheckResult, BranchInfo, CheckFinding, CheckResult, CheckVerdict, ExtractedPattern,
    ResidualMatch, Severity,
};
use crate::config::ResidualConfig;
use crate::external::diff::{parse_removed_lines, RemovedLine};
use crate::external::git::GitClient;
use std::collections::HashSet;
use std::time::Instant;

pub const CHECK_NAME: &str = "residual-patterns";

/// File types worth scanning: source, docs, scripts.
const SEARCH_PATHSPECS: &[&str] = &[
    "*.rs", "*.ts", "*.tsx", "*.js", "*.jsx", "*.py", "*.go", "*.rb", "*.sh", "*.md", "*.toml",
    "*.yml", "*.yaml",
];

const VENDOR_DIRS: &[&str] = &["node_modules/", "vendor/", "target/", "dist/", "third_party/"];

pub struct ResidualPatternScanner<'a> {
    git: &'a GitClient,
    remote: String,
    trunk: String,
    cfg: &'a ResidualConfig,
}

impl<'a> ResidualPatternScanner<'a> {
    pub fn new(git: &'a GitClient, remote: &str, trunk: &str, cfg: &'a ResidualConfig) -> Self {
        Self {
            git,
            remote: remote.to_string(),
            trunk: trunk.to_string(),
            cfg,
        }
    }

    pub async fn run(&self, branches: &[BranchInfo]) -> CheckResult {
        let started = Instant::now();
        let mut branch_results = Vec::new();
        let mut batch_findings = Vec::new();

        for branch in branches {
            let patterns = self.extract_patterns(branch).await;
            if patterns.is_empty() {
                branch_results.push(BranchCheckResult {
                    item_id: branch.item_id,
                    verdict: CheckVerdict::Pass,
                    findings: Vec::new(),
                });
                continue;
            }

            let residuals = self.scan_patterns(branch, &patterns).await;
            let mut findings = Vec::new();

            // one finding per pattern, grouping all its leftover locations
            let mut seen_patterns: Vec<&str> = Vec::new();
            for residual in &residuals {
                if seen_patterns.contains(&residual.pattern.as_str()) {
                    continue;
                }
                seen_patterns.push(&residual.pattern);

                let locations: Vec<String> = residuals
                    .iter()
                    .filter(|r| r.pattern == residual.pattern)
                    .map(|r| format!("{}:{}", r.file, r.line))
                    .collect();
                findings.push(
                    CheckFinding::new(
                        CHECK_NAME,
                        Severity::Warning,
                        format!(
                            "removed `{}` still present in {} location(s): {}",
                            residual.pattern,
                            locations.len(),
                            locations.join(", ")
                        ),
                    )
                    .for_item(branch.item_id)
                    .at_file(residual.file.clone())
                    .at_line(residual.line),
                );
            }

            if !residuals.is_empty() {
                batch_findings.push(
                    CheckFinding::new(
                        CHECK_NAME,
                        Severity::Warning,
                        format!(
                            "item #{}: {} residual occurrence(s) of {} removed pattern(s)",
                            branch.item_id,
                            residuals.len(),
                            seen_patterns.len()
                        ),
                    )
                    .for_item(branch.item_id),
                );
            }

            let verdict = if residuals.is_empty() {
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
            batch_findings,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        result.derive_passed();
        result
    }

    /// Literal patterns a branch's diff removed, deduplicated and capped.
    async fn extract_patterns(&self, branch: &BranchInfo) -> Vec<ExtractedPattern> {
        let (cwd, reference) = branch.diff_locator(&self.remote);
        let diff = match self
            .git
            .diff_unified_zero(&self.trunk, &reference, None, cwd.map(|p| p.as_path()))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(item = branch.item_id, error = %e, "Diff for pattern extraction failed");
                return Vec::new();
            }
        };

        let candidates = filter_candidates(&parse_removed_lines(&diff), branch.item_id, self.cfg);
        if candidates.len() == self.cfg.max_patterns_per_branch {
            tracing::info!(
                item = branch.item_id,
                cap = self.cfg.max_patterns_per_branch,
                "Pattern extraction hit the per-branch cap; scan is truncated"
            );
        }
        candidates
    }

    /// Whole-tree search for each pattern, minus the branch's own files,
    /// vendor directories, and test files.
    async fn scan_patterns(
        &self,
        branch: &BranchInfo,
        patterns: &[ExtractedPattern],
    ) -> Vec<ResidualMatch> {
        let mut residuals = Vec::new();

        for pattern in patterns {
            let matches = match self
                .git
                .grep_literal(&self.trunk, &pattern.pattern, SEARCH_PATHSPECS)
                .await
            {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::warn!(pattern = %pattern.pattern, error = %e, "Tree search failed");
                    continue;
                }
            };

            for m in matches {
                if branch.files_modified.iter().any(|f| f == &m.file) {
                    continue; // the branch already addressed this file
                }
                if in_vendor_dir(&m.file) || is_test_file(&m.file) {
                    continue;
                }
                residuals.push(ResidualMatch {
                    pattern: pattern.pattern.clone(),
                    file: m.file,
                    line: m.line,
                    content: m.content,
                    item_id: branch.item_id,
                });
            }
        }

        residuals
    }
}

/// Turn removed diff lines into scan-worthy literal patterns: trimmed,
/// long enough to be distinctive, not noise, deduplicated within the
/// branch, capped to bound scan cost.
pub fn filter_candidates(
    removed: &[RemovedLine],
    item_id: u64,
    cfg: &ResidualConfig,
) -> Vec<ExtractedPattern> {
    let mut seen = HashSet::new();
    let mut patterns = Vec::new();

    for line in removed {
        let trimmed = line.content.trim();
        if trimmed.len() < cfg.min_pattern_length || is_noise(trimmed) {
            continue;
        }
        if !seen.insert(trimmed.to_string()) {
            continue;
        }
        patterns.push(ExtractedPattern {
            pattern: trimmed.to_string(),
            source_file: line.file.clone(),
            item_id,
        });
        if patterns.len() >= cfg.max_patterns_per_branch {
            break;
        }
    }

    patterns
}

/// Lines that would match everywhere or mean nothing: comments, import
/// plumbing, and lone closing delimiters.
fn is_noise(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
    {
        return true;
    }
    if trimmed.starts_with("import ")
        || trimmed.starts_with("export ")
        || trimmed.starts_with("from ")
    {
        return true;
    }
    trimmed.chars().all(|c| "}])>;,".contains(c))
}

fn in_vendor_dir(path: &str) -> bool {
    VENDOR_DIRS
        .iter()
        .any(|dir| path.starts_with(dir) || path.contains(&format!("/{dir}")))
}

fn is_test_file(path: &str) -> bool {
    let in_test_dir = path.starts_with("tests/")
        || path.starts_with("test/")
        || path.contains("/tests/")
        || path.contains("/test/")
        || path.contains("__tests__");
    let test_named = path.contains(".test.") || path.contains("_test.") || path.contains(".spec.");
    in_test_dir || test_named
}

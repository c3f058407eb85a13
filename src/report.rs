//! Report assembly and rendering
//!
//! Folds every check's output into per-item verdicts and one batch verdict,
//! renders the Markdown report, and posts per-item slices to their review
//! threads. The MergeReport is the terminal artifact of a run: immutable
//! once built, archived as Markdown plus JSON.

use crate::checks::{
    BatchVerdict, BranchInfo, CheckFinding, CheckResult, CheckVerdict, Severity,
};
use crate::github::GitHubClient;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The terminal artifact of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub run_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub branches: Vec<BranchInfo>,
    pub checks: Vec<CheckResult>,
    pub issue_verdicts: BTreeMap<u64, CheckVerdict>,
    pub batch_verdict: BatchVerdict,
    pub findings: Vec<CheckFinding>,
}

pub fn build(
    run_id: Option<String>,
    branches: Vec<BranchInfo>,
    checks: Vec<CheckResult>,
) -> MergeReport {
    let issue_verdicts = compute_issue_verdicts(&branches, &checks);
    let batch_verdict = compute_batch_verdict(&issue_verdicts, &checks);

    let findings = checks
        .iter()
        .flat_map(|check| {
            check
                .batch_findings
                .iter()
                .chain(check.branch_results.iter().flat_map(|r| r.findings.iter()))
                .cloned()
        })
        .collect();

    MergeReport {
        run_id,
        timestamp: Utc::now(),
        branches,
        checks,
        issue_verdicts,
        batch_verdict,
        findings,
    }
}

/// Worst verdict per item across every check that reported on it. Items
/// absent from a check are unaffected by it.
pub fn compute_issue_verdicts(
    branches: &[BranchInfo],
    checks: &[CheckResult],
) -> BTreeMap<u64, CheckVerdict> {
    let mut verdicts = BTreeMap::new();

    for branch in branches {
        let mut worst = CheckVerdict::Pass;
        for check in checks {
            for result in &check.branch_results {
                if result.item_id == branch.item_id {
                    worst = worst.max(result.verdict);
                }
            }
        }
        verdicts.insert(branch.item_id, worst);
    }

    verdicts
}

/// Pointwise maximum-severity reduction: any FAIL ⇒ BLOCKED; an
/// unattributable batch-level error also forces BLOCKED even when every
/// per-item verdict passes; else any WARN or not-passed check ⇒
/// NEEDS_ATTENTION; else READY.
pub fn compute_batch_verdict(
    issue_verdicts: &BTreeMap<u64, CheckVerdict>,
    checks: &[CheckResult],
) -> BatchVerdict {
    if issue_verdicts.values().any(|&v| v == CheckVerdict::Fail) {
        return BatchVerdict::Blocked;
    }

    let unattributable_error = checks.iter().any(|check| {
        check.batch_findings.iter().any(|finding| {
            finding.severity == Severity::Error
                && !finding
                    .item_id
                    .is_some_and(|id| check.branch_results.iter().any(|r| r.item_id == id))
        })
    });
    if unattributable_error {
        return BatchVerdict::Blocked;
    }

    let any_warn = issue_verdicts.values().any(|&v| v == CheckVerdict::Warn);
    let any_not_passed = checks.iter().any(|check| !check.passed);
    if any_warn || any_not_passed {
        return BatchVerdict::NeedsAttention;
    }

    BatchVerdict::Ready
}

fn verdict_icon(verdict: CheckVerdict) -> &'static str {
    match verdict {
        CheckVerdict::Pass => "✅",
        CheckVerdict::Warn => "⚠️",
        CheckVerdict::Fail => "❌",
    }
}

fn batch_icon(verdict: BatchVerdict) -> &'static str {
    match verdict {
        BatchVerdict::Ready => "✅",
        BatchVerdict::NeedsAttention => "⚠️",
        BatchVerdict::Blocked => "🚫",
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "ℹ️",
        Severity::Warning => "⚠️",
        Severity::Error => "❌",
    }
}

fn finding_line(finding: &CheckFinding) -> String {
    let location = match (&finding.file, finding.line) {
        (Some(file), Some(line)) => format!(" (`{file}:{line}`)"),
        (Some(file), None) => format!(" (`{file}`)"),
        _ => String::new(),
    };
    format!(
        "- {} {}{location}",
        severity_icon(finding.severity),
        finding.message
    )
}

fn title_block(report: &MergeReport) -> String {
    let mut out = String::new();
    out.push_str("# Merge readiness report\n\n");
    out.push_str(&format!(
        "**Batch verdict: {} {}**\n\n",
        batch_icon(report.batch_verdict),
        report.batch_verdict
    ));
    if let Some(run_id) = &report.run_id {
        out.push_str(&format!("- Run: `{run_id}`\n"));
    }
    out.push_str(&format!(
        "- Generated: {}\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "- Items: {} · Checks: {}\n\n",
        report.branches.len(),
        report.checks.len()
    ));
    out
}

fn summary_section(report: &MergeReport) -> String {
    let errors = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    let warnings = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Warning)
        .count();
    format!(
        "## Summary\n\n{errors} error(s), {warnings} warning(s) across {} item(s) and {} check(s)\n",
        report.branches.len(),
        report.checks.len()
    )
}

/// Full report: title block → per-item verdict table → one section per
/// check (batch findings, then each item's non-info findings) → summary.
pub fn format_report_markdown(report: &MergeReport) -> String {
    let mut out = title_block(report);

    out.push_str("## Item verdicts\n\n");
    out.push_str("| Item | Title | Branch | Verdict |\n");
    out.push_str("|---|---|---|---|\n");
    for branch in &report.branches {
        let verdict = report
            .issue_verdicts
            .get(&branch.item_id)
            .copied()
            .unwrap_or(CheckVerdict::Pass);
        out.push_str(&format!(
            "| #{} | {} | `{}` | {} {} |\n",
            branch.item_id,
            branch.title,
            branch.branch_name,
            verdict_icon(verdict),
            verdict
        ));
    }
    out.push('\n');

    for check in &report.checks {
        out.push_str(&format!("## {} ({} ms)\n\n", check.name, check.duration_ms));

        for finding in &check.batch_findings {
            out.push_str(&finding_line(finding));
            out.push('\n');
        }
        if !check.batch_findings.is_empty() {
            out.push('\n');
        }

        for result in &check.branch_results {
            let notable: Vec<&CheckFinding> = result
                .findings
                .iter()
                .filter(|f| f.severity != Severity::Info)
                .collect();
            if notable.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "**#{} · {} {}**\n\n",
                result.item_id,
                verdict_icon(result.verdict),
                result.verdict
            ));
            for finding in notable {
                out.push_str(&finding_line(finding));
                out.push('\n');
            }
            out.push('\n');
        }

        if check.batch_findings.is_empty() && check.branch_results.iter().all(|r| {
            r.findings.iter().all(|f| f.severity == Severity::Info)
        }) {
            out.push_str("No findings.\n\n");
        }
    }

    out.push_str(&summary_section(report));
    out
}

/// The same grammar filtered to one item plus any batch finding that names
/// it, the slice posted on the item's review thread.
pub fn format_branch_report_markdown(report: &MergeReport, item_id: u64) -> String {
    let mut out = title_block(report);

    if let Some(branch) = report.branches.iter().find(|b| b.item_id == item_id) {
        let verdict = report
            .issue_verdicts
            .get(&item_id)
            .copied()
            .unwrap_or(CheckVerdict::Pass);
        out.push_str(&format!(
            "**#{} {} (`{}`): {} {}**\n\n",
            branch.item_id,
            branch.title,
            branch.branch_name,
            verdict_icon(verdict),
            verdict
        ));
    }

    for check in &report.checks {
        let batch: Vec<&CheckFinding> = check
            .batch_findings
            .iter()
            .filter(|f| f.item_id == Some(item_id) || message_names_item(&f.message, item_id))
            .collect();
        let own: Vec<&CheckFinding> = check
            .branch_results
            .iter()
            .filter(|r| r.item_id == item_id)
            .flat_map(|r| r.findings.iter())
            .filter(|f| f.severity != Severity::Info)
            .collect();

        if batch.is_empty() && own.is_empty() {
            continue;
        }

        out.push_str(&format!("## {}\n\n", check.name));
        for finding in batch.into_iter().chain(own) {
            out.push_str(&finding_line(finding));
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

/// Whether a finding message mentions `#<item_id>` as a whole token;
/// `#4` must not match `#41`.
fn message_names_item(message: &str, item_id: u64) -> bool {
    let tag = format!("#{item_id}");
    let mut rest = message;
    while let Some(pos) = rest.find(&tag) {
        let after = &rest[pos + tag.len()..];
        if !after.starts_with(|c: char| c.is_ascii_digit()) {
            return true;
        }
        rest = after;
    }
    false
}

/// Post each item's scoped report on its review thread. A failed post is
/// logged and does not fail the run.
pub async fn post_reports(github: &GitHubClient, report: &MergeReport) -> usize {
    let mut posted = 0;
    for branch in &report.branches {
        let Some(external_ref_id) = branch.external_ref_id else {
            tracing::info!(item = branch.item_id, "No review thread recorded, skipping post");
            continue;
        };
        let body = format_branch_report_markdown(report, branch.item_id);
        match github.post_review_comment(external_ref_id, &body).await {
            Ok(()) => posted += 1,
            Err(e) => {
                tracing::warn!(item = branch.item_id, error = %e, "Failed to post report comment");
            }
        }
    }
    posted
}

/// Archive the rendered report and its JSON form under the report dir.
pub fn persist(report: &MergeReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report dir {}", dir.display()))?;

    let stem = report
        .run_id
        .clone()
        .unwrap_or_else(|| report.timestamp.format("%Y%m%d-%H%M%S").to_string());

    let markdown_path = dir.join(format!("{stem}.md"));
    std::fs::write(&markdown_path, format_report_markdown(report))?;

    let json_path = dir.join(format!("{stem}.json"));
    std::fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

    Ok(markdown_path)
}

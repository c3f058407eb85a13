use mergeready::checks::mirroring;
use mergeready::checks::{BranchInfo, CheckVerdict, MirrorDirection, Severity};
use mergeready::config::MirrorPair;

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

fn pairs() -> Vec<MirrorPair> {
    vec![MirrorPair {
        source: "config/live".to_string(),
        target: "packaged/config".to_string(),
    }]
}

#[test]
fn test_source_only_yields_exactly_one_warn_naming_counterpart() {
    let result = mirroring::run(&[branch(1, &["config/live/x.md"])], &pairs());

    assert_eq!(result.branch_results.len(), 1);
    assert_eq!(result.branch_results[0].verdict, CheckVerdict::Warn);
    let findings = &result.branch_results[0].findings;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Warning);
    assert!(findings[0].message.contains("packaged/config/x.md"));
}

#[test]
fn test_both_sides_modified_is_pass() {
    let result = mirroring::run(
        &[branch(1, &["config/live/x.md", "packaged/config/x.md"])],
        &pairs(),
    );
    assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
    assert!(result.branch_results[0].findings.is_empty());
}

#[test]
fn test_each_unmatched_side_reports_direction() {
    let source_only = mirroring::unmirrored_changes(&branch(1, &["config/live/a.md"]), &pairs());
    assert_eq!(source_only[0].direction, MirrorDirection::SourceOnly);

    let target_only = mirroring::unmirrored_changes(&branch(1, &["packaged/config/a.md"]), &pairs());
    assert_eq!(target_only[0].direction, MirrorDirection::TargetOnly);
}

#[test]
fn test_multiple_pairs_and_branches() {
    let mut all_pairs = pairs();
    all_pairs.push(MirrorPair {
        source: "docs/src".to_string(),
        target: "site/docs".to_string(),
    });

    let branches = [
        branch(1, &["config/live/a.md", "packaged/config/a.md"]),
        branch(2, &["docs/src/guide.md"]),
        branch(3, &["src/main.rs"]),
    ];
    let result = mirroring::run(&branches, &all_pairs);

    assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
    assert_eq!(result.branch_results[1].verdict, CheckVerdict::Warn);
    assert!(result.branch_results[1].findings[0]
        .message
        .contains("site/docs/guide.md"));
    assert_eq!(result.branch_results[2].verdict, CheckVerdict::Pass);
}

#[test]
fn test_mirroring_never_produces_fail() {
    let many: Vec<String> = (0..20).map(|i| format!("config/live/f{i}.md")).collect();
    let many_refs: Vec<&str> = many.iter().map(String::as_str).collect();
    let result = mirroring::run(&[branch(9, &many_refs)], &pairs());

    assert_eq!(result.branch_results[0].verdict, CheckVerdict::Warn);
    assert_eq!(result.branch_results[0].findings.len(), 20);
}

#[test]
fn test_no_pairs_configured_is_always_pass() {
    let result = mirroring::run(&[branch(1, &["anything/at/all.md"])], &[]);
    assert_eq!(result.branch_results[0].verdict, CheckVerdict::Pass);
}

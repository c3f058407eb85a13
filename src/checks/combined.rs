//! Combined integration test
//!
//! The only check that mutates repository state. It runs as a strict state
//! machine over the working tree: create a uniquely-named integration branch
//! from trunk, merge every feature branch into it (a conflicted branch is
//! recorded and aborted, not allowed to block the rest), then run the
//! project's test and build commands against the merged result. The working
//! tree is an exclusively-owned resource: a file lock guards the whole run
//! and cleanup (restore the original branch, force-delete the temp branch)
//! runs on every exit path.

use super::{
    BranchCheckResult, BranchInfo, CheckFinding, CheckResult, CheckVerdict, Severity,
};
use crate::config::CombinedConfig;
use crate::external::command::{CommandError, CommandExecutor, ExecOptions};
use crate::external::git::{GitClient, GitError};
use anyhow::{anyhow, Result};
use chrono::Utc;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const CHECK_NAME: &str = "combined-integration";

/// Excerpts of subprocess output carried in findings are bounded.
const OUTPUT_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TesterState {
    Idle,
    TempBranchCreated,
    MergingBranches,
    AllMerged,
    MergeFailed,
    TestRun,
    BuildRun,
    Cleaned,
}

/// Exclusive ownership of the repository's checked-out state. Only one
/// integration run may own the working tree at a time.
struct WorktreeLock {
    _guard: RwLockWriteGuard<'static, File>,
}

impl WorktreeLock {
    fn acquire(lock_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(lock_dir)?;
        let lock_file = File::create(lock_dir.join("worktree.lock"))?;
        let lock = Box::leak(Box::new(RwLock::new(lock_file)));
        let guard = lock.try_write().map_err(|_| {
            anyhow!("Another integration run already owns the working tree")
        })?;
        Ok(Self { _guard: guard })
    }
}

struct RunContext {
    state: TesterState,
    original_branch: Option<String>,
    temp_branch: String,
    branch_results: Vec<BranchCheckResult>,
    batch_findings: Vec<CheckFinding>,
}

impl RunContext {
    fn advance(&mut self, next: TesterState) {
        tracing::debug!(from = ?self.state, to = ?next, "Integration tester transition");
        self.state = next;
    }

    fn batch_error(&mut self, message: impl Into<String>) {
        self.batch_findings
            .push(CheckFinding::new(CHECK_NAME, Severity::Error, message));
    }

    fn batch_warning(&mut self, message: impl Into<String>) {
        self.batch_findings
            .push(CheckFinding::new(CHECK_NAME, Severity::Warning, message));
    }

    fn batch_info(&mut self, message: impl Into<String>) {
        self.batch_findings
            .push(CheckFinding::new(CHECK_NAME, Severity::Info, message));
    }
}

pub struct CombinedBranchTester<'a> {
    git: &'a GitClient,
    executor: Arc<dyn CommandExecutor>,
    remote: String,
    trunk: String,
    cfg: &'a CombinedConfig,
    lock_dir: PathBuf,
}

impl<'a> CombinedBranchTester<'a> {
    pub fn new(
        git: &'a GitClient,
        executor: Arc<dyn CommandExecutor>,
        remote: &str,
        trunk: &str,
        cfg: &'a CombinedConfig,
    ) -> Self {
        Self {
            git,
            executor,
            remote: remote.to_string(),
            trunk: trunk.to_string(),
            cfg,
            lock_dir: PathBuf::from(".mergeready"),
        }
    }

    /// Override the lock directory (tests run against temp dirs).
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    pub async fn run(&self, branches: &[BranchInfo]) -> CheckResult {
        let started = Instant::now();
        let mut ctx = RunContext {
            state: TesterState::Idle,
            original_branch: None,
            temp_branch: format!(
                "mergeready/integration-{}-{}",
                Utc::now().format("%Y%m%d-%H%M%S"),
                &Uuid::new_v4().to_string()[..8]
            ),
            branch_results: Vec::new(),
            batch_findings: Vec::new(),
        };

        let _lock = match WorktreeLock::acquire(&self.lock_dir) {
            Ok(lock) => lock,
            Err(e) => {
                ctx.batch_error(format!("Could not acquire working-tree lock: {e}"));
                ctx.advance(TesterState::Cleaned);
                return self.finish(ctx, started);
            }
        };

        println!("🔀 Integration test: merging {} branch(es)", branches.len());

        // Every path below ends in cleanup(); no `?` escapes past it.
        self.execute(&mut ctx, branches).await;
        self.cleanup(&mut ctx).await;

        self.finish(ctx, started)
    }

    async fn execute(&self, ctx: &mut RunContext, branches: &[BranchInfo]) {
        match self.git.current_branch().await {
            Ok(branch) => ctx.original_branch = Some(branch),
            Err(e) => {
                ctx.batch_error(format!("Could not record current branch: {e}"));
                return;
            }
        }

        if let Err(e) = self.git.fetch(&self.remote).await {
            ctx.batch_warning(format!(
                "Fetch of {} failed, continuing against local refs: {e}",
                self.remote
            ));
        }

        let start_ref = self.trunk_start_ref().await;
        if let Err(e) = self.git.create_branch_at(&ctx.temp_branch, &start_ref).await {
            ctx.batch_error(format!(
                "Could not create integration branch `{}` from {start_ref}: {e}",
                ctx.temp_branch
            ));
            return;
        }
        ctx.advance(TesterState::TempBranchCreated);

        ctx.advance(TesterState::MergingBranches);
        let mut failed_merges = 0usize;
        for branch in branches {
            let merge_ref = merge_ref(branch, &self.remote);
            match self.git.merge_no_ff(&merge_ref).await {
                Ok(()) => {
                    println!("✅ Merged {}", branch.branch_name);
                    ctx.branch_results.push(BranchCheckResult {
                        item_id: branch.item_id,
                        verdict: CheckVerdict::Pass,
                        findings: vec![CheckFinding::new(
                            CHECK_NAME,
                            Severity::Info,
                            format!("`{}` merged cleanly", branch.branch_name),
                        )
                        .for_item(branch.item_id)],
                    });
                }
                Err(e) => {
                    failed_merges += 1;
                    let conflict_files = match &e {
                        GitError::MergeConflict => {
                            self.git.unmerged_files().await.unwrap_or_default()
                        }
                        _ => Vec::new(),
                    };
                    let detail = if conflict_files.is_empty() {
                        format!("`{}` failed to merge: {e}", branch.branch_name)
                    } else {
                        format!(
                            "`{}` conflicts in: {}",
                            branch.branch_name,
                            conflict_files.join(", ")
                        )
                    };
                    println!("❌ {detail}");
                    ctx.branch_results.push(BranchCheckResult {
                        item_id: branch.item_id,
                        verdict: CheckVerdict::Fail,
                        findings: vec![CheckFinding::new(CHECK_NAME, Severity::Error, detail)
                            .for_item(branch.item_id)],
                    });

                    // restore the temp branch so remaining branches still get evaluated
                    if let Err(abort_err) = self.git.merge_abort().await {
                        tracing::warn!(error = %abort_err, "Merge abort failed");
                    }
                }
            }
        }

        if failed_merges > 0 {
            ctx.advance(TesterState::MergeFailed);
            ctx.batch_error(format!(
                "{failed_merges} of {} branch(es) failed to merge cleanly; skipping test/build",
                branches.len()
            ));
            return;
        }
        ctx.advance(TesterState::AllMerged);

        ctx.advance(TesterState::TestRun);
        self.run_project_command(ctx, "test", &self.cfg.test_command)
            .await;
        ctx.advance(TesterState::BuildRun);
        self.run_project_command(ctx, "build", &self.cfg.build_command)
            .await;
    }

    /// Branch from the freshly-fetched remote trunk when it exists, else the
    /// local trunk.
    async fn trunk_start_ref(&self) -> String {
        match self
            .git
            .remote_branch_exists(&self.remote, &self.trunk)
            .await
        {
            Ok(true) => format!("{}/{}", self.remote, self.trunk),
            _ => self.trunk.clone(),
        }
    }

    async fn run_project_command(&self, ctx: &mut RunContext, label: &str, command: &str) {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            ctx.batch_error(format!("No {label} command configured"));
            return;
        };
        let args: Vec<&str> = parts.collect();
        let opts = ExecOptions::with_timeout(Duration::from_secs(self.cfg.timeout_seconds));

        println!("🧪 Running {label} command: {command}");
        match self.executor.execute(program, &args, &opts).await {
            Ok(output) if output.success() => {
                ctx.batch_info(format!("{label} command passed on the merged result"));
            }
            Ok(output) => {
                let excerpt = truncate_output(&format!("{}{}", output.stdout, output.stderr));
                ctx.batch_error(format!(
                    "{label} command failed (exit {}): {excerpt}",
                    output.status_code
                ));
            }
            Err(CommandError::Timeout { timeout_ms }) => {
                ctx.batch_error(format!(
                    "{label} command timed out after {}s",
                    timeout_ms / 1000
                ));
            }
            Err(e) => {
                ctx.batch_error(format!("{label} command could not run: {e}"));
            }
        }
    }

    /// Restore the originally checked-out branch and drop the temp branch.
    /// Runs on every exit path; a failed restore is itself an infrastructure
    /// error.
    async fn cleanup(&self, ctx: &mut RunContext) {
        if let Some(original) = &ctx.original_branch {
            if let Err(e) = self.git.checkout(original).await {
                ctx.batch_error(format!("Could not restore original branch `{original}`: {e}"));
            }
        }

        if ctx.state != TesterState::Idle {
            if let Err(e) = self.git.delete_branch(&ctx.temp_branch, true).await {
                ctx.batch_warning(format!(
                    "Could not delete integration branch `{}`: {e}",
                    ctx.temp_branch
                ));
            }
        }

        ctx.advance(TesterState::Cleaned);
    }

    fn finish(&self, ctx: RunContext, started: Instant) -> CheckResult {
        debug_assert_eq!(ctx.state, TesterState::Cleaned);
        let mut result = CheckResult {
            name: CHECK_NAME.to_string(),
            passed: true,
            branch_results: ctx.branch_results,
            batch_findings: ctx.batch_findings,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        result.derive_passed();
        result
    }
}

/// The ref to merge for a branch: the local branch when a worktree carries
/// it, otherwise the remote-tracking ref.
fn merge_ref(branch: &BranchInfo, remote: &str) -> String {
    if branch.worktree_path.is_some() {
        branch.branch_name.clone()
    } else {
        format!("{remote}/{}", branch.branch_name)
    }
}

fn truncate_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() <= OUTPUT_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(OUTPUT_EXCERPT_CHARS).collect();
    format!("{cut}…")
}

//! Branch resolution
//!
//! Maps work-item identifiers to their feature branches and computes each
//! branch's modified-file set relative to trunk. A local worktree carrying
//! the branch wins over the remote-tracking ref because its diff is fresh
//! and needs no network. Unresolvable identifiers are logged and skipped;
//! they never abort the batch.

use crate::checks::BranchInfo;
use crate::external::git::{GitClient, WorktreeEntry};
use crate::github::GitHubClient;
use crate::run_log::{self, RunLogRecord};

pub struct BranchResolver<'a> {
    git: &'a GitClient,
    github: Option<&'a GitHubClient>,
    remote: String,
    trunk: String,
    branch_prefix: String,
}

impl<'a> BranchResolver<'a> {
    pub fn new(
        git: &'a GitClient,
        github: Option<&'a GitHubClient>,
        remote: &str,
        trunk: &str,
        branch_prefix: &str,
    ) -> Self {
        Self {
            git,
            github,
            remote: remote.to_string(),
            trunk: trunk.to_string(),
            branch_prefix: branch_prefix.to_string(),
        }
    }

    /// Resolve a batch of work-item identifiers. Output order follows input
    /// order, with skipped identifiers simply absent.
    pub async fn resolve(
        &self,
        item_ids: &[u64],
        records: &[RunLogRecord],
    ) -> Vec<BranchInfo> {
        let worktrees = match self.git.list_worktrees().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list worktrees, falling back to remote refs");
                Vec::new()
            }
        };

        let mut branches = Vec::new();
        for &item_id in item_ids {
            match self.resolve_one(item_id, &worktrees, records).await {
                Some(info) => branches.push(info),
                None => {
                    println!("⚠️  No branch found for item #{item_id}, skipping");
                }
            }
        }

        branches
    }

    async fn resolve_one(
        &self,
        item_id: u64,
        worktrees: &[WorktreeEntry],
        records: &[RunLogRecord],
    ) -> Option<BranchInfo> {
        let item_prefix = format!("{}{}-", self.branch_prefix, item_id);

        // Exact local-worktree match wins: freshest diff, no network.
        let worktree = worktrees.iter().find(|entry| {
            entry
                .branch
                .as_deref()
                .is_some_and(|name| name.starts_with(&item_prefix))
        });

        let (branch_name, worktree_path) = match worktree {
            Some(entry) => (
                entry.branch.clone().unwrap_or_default(),
                Some(entry.path.clone()),
            ),
            None => {
                let pattern = format!("{item_prefix}*");
                let candidates = match self.git.list_remote_branches(&self.remote, &pattern).await {
                    Ok(names) => names,
                    Err(e) => {
                        tracing::warn!(item = item_id, error = %e, "Remote branch listing failed");
                        Vec::new()
                    }
                };
                let name = candidates.into_iter().next()?;
                (name, None)
            }
        };

        let files_modified = match &worktree_path {
            Some(path) => {
                self.git
                    .changed_files(&self.trunk, "HEAD", Some(path))
                    .await
            }
            None => {
                let remote_ref = format!("{}/{}", self.remote, branch_name);
                self.git.changed_files(&self.trunk, &remote_ref, None).await
            }
        };

        let files_modified = match files_modified {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(item = item_id, branch = %branch_name, error = %e, "Diff against trunk failed, skipping item");
                return None;
            }
        };

        let record = run_log::record_for(records, item_id);
        let title = match record {
            Some(r) => r.title.clone(),
            None => self.lookup_title(item_id).await,
        };

        tracing::info!(
            item = item_id,
            branch = %branch_name,
            files = files_modified.len(),
            worktree = worktree_path.is_some(),
            "Resolved work item"
        );

        Some(BranchInfo {
            item_id,
            title,
            branch_name,
            worktree_path,
            external_ref_id: record.and_then(|r| r.external_ref_id),
            files_modified,
        })
    }

    async fn lookup_title(&self, item_id: u64) -> String {
        if let Some(github) = self.github {
            match github.fetch_issue_title(item_id).await {
                Ok(title) => return title,
                Err(e) => {
                    tracing::warn!(item = item_id, error = %e, "Title lookup failed, using placeholder");
                }
            }
        }
        format!("Item #{item_id}")
    }
}

//! Git command abstractions
//!
//! Provides a typed wrapper over subprocess git, enabling testable
//! version-control integrations through dependency injection. Every
//! operation takes explicit refs; nothing here depends on which branch is
//! currently checked out except the operations that exist to change it.

use super::command::{CommandError, CommandExecutor, ExecOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub type BranchName = String;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Repository not found or not a git repository")]
    RepositoryNotFound,
    #[error("Branch not found: {branch}")]
    BranchNotFound { branch: BranchName },
    #[error("Merge conflict detected")]
    MergeConflict,
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("Git command failed: {message}")]
    GitCommandFailed { message: String },
}

/// One worktree from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<BranchName>,
}

/// One match from `git grep -n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepMatch {
    pub file: String,
    pub line: u32,
    pub content: String,
}

/// Subprocess-backed git client.
pub struct GitClient {
    executor: Arc<dyn CommandExecutor>,
}

impl GitClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn execute_git(&self, args: &[&str]) -> Result<String, GitError> {
        self.execute_git_in(args, None).await
    }

    async fn execute_git_in(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, GitError> {
        let opts = match cwd {
            Some(dir) => ExecOptions::in_dir(dir),
            None => ExecOptions::default(),
        };
        let output = self.executor.execute("git", args, &opts).await?;

        if !output.success() {
            return Err(classify_git_error(&output.stderr, &output.stdout, args));
        }

        Ok(output.stdout)
    }

    /// Get the current branch name.
    pub async fn current_branch(&self) -> Result<BranchName, GitError> {
        let branch = self
            .execute_git(&["branch", "--show-current"])
            .await?
            .trim()
            .to_string();

        if branch.is_empty() {
            return Err(GitError::GitCommandFailed {
                message: "HEAD is detached".to_string(),
            });
        }

        Ok(branch)
    }

    /// Fetch a remote.
    pub async fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.execute_git(&["fetch", remote]).await?;
        Ok(())
    }

    /// Checkout an existing branch.
    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.execute_git(&["checkout", branch]).await?;
        Ok(())
    }

    /// Create a branch at the given start ref and check it out.
    pub async fn create_branch_at(&self, branch: &str, start_ref: &str) -> Result<(), GitError> {
        self.execute_git(&["checkout", "-b", branch, start_ref])
            .await?;
        Ok(())
    }

    /// Delete a local branch.
    pub async fn delete_branch(&self, branch: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.execute_git(&["branch", flag, branch]).await?;
        Ok(())
    }

    /// Merge a ref into the current branch without fast-forwarding.
    /// A conflicted merge surfaces as [`GitError::MergeConflict`] and leaves
    /// the working tree mid-merge; callers list the unmerged paths and abort.
    pub async fn merge_no_ff(&self, reference: &str) -> Result<(), GitError> {
        self.execute_git(&["merge", "--no-ff", "--no-edit", reference])
            .await?;
        Ok(())
    }

    /// Abort an in-progress merge, restoring the pre-merge state.
    pub async fn merge_abort(&self) -> Result<(), GitError> {
        self.execute_git(&["merge", "--abort"]).await?;
        Ok(())
    }

    /// List files with unresolved merge conflicts.
    pub async fn unmerged_files(&self) -> Result<Vec<String>, GitError> {
        let output = self
            .execute_git(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(nonempty_lines(&output))
    }

    /// Files changed between `base` and `head` (three-dot, i.e. relative to
    /// their merge base). Runs in `cwd` when given so worktree-local diffs
    /// stay fast and offline.
    pub async fn changed_files(
        &self,
        base: &str,
        head: &str,
        cwd: Option<&Path>,
    ) -> Result<Vec<String>, GitError> {
        let range = format!("{base}...{head}");
        let output = self
            .execute_git_in(&["diff", "--name-only", &range], cwd)
            .await?;
        Ok(nonempty_lines(&output))
    }

    /// Raw `--unified=0` diff text between `base` and `head`, optionally
    /// restricted to one file. The zero-context format keeps hunk headers
    /// parseable without dragging surrounding lines along.
    pub async fn diff_unified_zero(
        &self,
        base: &str,
        head: &str,
        file: Option<&str>,
        cwd: Option<&Path>,
    ) -> Result<String, GitError> {
        let range = format!("{base}...{head}");
        let mut args = vec!["diff", "--unified=0", &range];
        if let Some(path) = file {
            args.push("--");
            args.push(path);
        }
        self.execute_git_in(&args, cwd).await
    }

    /// List remote branches matching a glob, stripped of the remote prefix.
    pub async fn list_remote_branches(
        &self,
        remote: &str,
        pattern: &str,
    ) -> Result<Vec<BranchName>, GitError> {
        let qualified = format!("{remote}/{pattern}");
        let output = self
            .execute_git(&["branch", "-r", "--list", &qualified])
            .await?;

        let prefix = format!("{remote}/");
        Ok(nonempty_lines(&output)
            .into_iter()
            .filter_map(|line| {
                let name = line.trim().trim_start_matches("* ").trim();
                // "origin/HEAD -> origin/main" lines carry no branch of their own
                if name.contains("->") {
                    return None;
                }
                name.strip_prefix(&prefix).map(str::to_string)
            })
            .collect())
    }

    /// List registered worktrees and the branch each has checked out.
    pub async fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, GitError> {
        let output = self
            .execute_git(&["worktree", "list", "--porcelain"])
            .await?;
        Ok(parse_worktree_list(&output))
    }

    /// Check if a remote-tracking branch exists.
    pub async fn remote_branch_exists(
        &self,
        remote: &str,
        branch: &str,
    ) -> Result<bool, GitError> {
        let reference = format!("refs/remotes/{remote}/{branch}");
        let result = self
            .execute_git(&["show-ref", "--verify", "--quiet", &reference])
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(GitError::GitCommandFailed { .. }) => Ok(false),
            Err(GitError::CommandError {
                source: CommandError::ExecutionFailed { .. },
            }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fixed-string search over the tree of `reference`, restricted to the
    /// given pathspecs. Exit status 1 (no matches) is an empty result, not
    /// an error.
    pub async fn grep_literal(
        &self,
        reference: &str,
        pattern: &str,
        pathspecs: &[&str],
    ) -> Result<Vec<GrepMatch>, GitError> {
        let mut args = vec!["grep", "-n", "-F", "-e", pattern, reference, "--"];
        args.extend_from_slice(pathspecs);

        let output = self
            .executor
            .execute("git", &args, &ExecOptions::default())
            .await?;

        if !output.success() {
            // git grep exits 1 when nothing matches
            if output.status_code == 1 && output.stderr.trim().is_empty() {
                return Ok(Vec::new());
            }
            return Err(classify_git_error(&output.stderr, &output.stdout, &args));
        }

        let prefix = format!("{reference}:");
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| parse_grep_line(line, &prefix))
            .collect())
    }
}

fn classify_git_error(stderr: &str, stdout: &str, args: &[&str]) -> GitError {
    if stderr.contains("not a git repository") {
        GitError::RepositoryNotFound
    } else if stderr.contains("not found")
        || stderr.contains("did not match any file(s) known to git")
    {
        GitError::BranchNotFound {
            branch: args.last().unwrap_or(&"unknown").to_string(),
        }
    } else if stdout.contains("CONFLICT")
        || stderr.contains("CONFLICT")
        || stdout.contains("Automatic merge failed")
        || stderr.contains("Automatic merge failed")
    {
        GitError::MergeConflict
    } else {
        GitError::GitCommandFailed {
            message: if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            },
        }
    }
}

fn nonempty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `git worktree list --porcelain` output. Entries are separated by
/// blank lines; each starts with a `worktree <path>` line and may carry a
/// `branch refs/heads/<name>` line (detached worktrees have none).
fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch: Option<String> = None;

    for line in output.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let Some(p) = path.take() {
                entries.push(WorktreeEntry {
                    path: p,
                    branch: branch.take(),
                });
            }
            branch = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(rest.trim()));
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(
                rest.trim()
                    .strip_prefix("refs/heads/")
                    .unwrap_or(rest.trim())
                    .to_string(),
            );
        }
    }

    entries
}

/// Parse one `git grep -n` output line of the form
/// `<ref>:<file>:<line>:<content>` once the ref prefix is known.
fn parse_grep_line(line: &str, ref_prefix: &str) -> Option<GrepMatch> {
    let rest = line.strip_prefix(ref_prefix)?;
    let mut parts = rest.splitn(3, ':');
    let file = parts.next()?.to_string();
    let line_no: u32 = parts.next()?.parse().ok()?;
    let content = parts.next()?.to_string();
    Some(GrepMatch {
        file,
        line: line_no,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::command::CommandOutput;
    use async_trait::async_trait;

    // Simple mock for testing
    struct MockCommandExecutor {
        responses: std::collections::HashMap<String, Result<CommandOutput, CommandError>>,
    }

    impl MockCommandExecutor {
        fn new() -> Self {
            Self {
                responses: std::collections::HashMap::new(),
            }
        }

        fn expect_command(
            mut self,
            program: &str,
            args: &[&str],
            response: Result<CommandOutput, CommandError>,
        ) -> Self {
            let key = format!("{} {}", program, args.join(" "));
            self.responses.insert(key, response);
            self
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(
            &self,
            program: &str,
            args: &[&str],
            _opts: &ExecOptions,
        ) -> Result<CommandOutput, CommandError> {
            let key = format!("{} {}", program, args.join(" "));
            self.responses
                .get(&key)
                .cloned()
                .unwrap_or(Err(CommandError::CommandNotFound {
                    command: program.to_string(),
                }))
        }
    }

    fn ok_output(stdout: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            status_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    #[tokio::test]
    async fn test_current_branch_success() {
        let mock = MockCommandExecutor::new().expect_command(
            "git",
            &["branch", "--show-current"],
            ok_output("main\n"),
        );

        let client = GitClient::new(Arc::new(mock));
        assert_eq!(client.current_branch().await.unwrap(), "main");
    }

    #[tokio::test]
    async fn test_merge_conflict_classified() {
        let mock = MockCommandExecutor::new().expect_command(
            "git",
            &["merge", "--no-ff", "--no-edit", "feature/42-login"],
            Ok(CommandOutput {
                status_code: 1,
                stdout: "CONFLICT (content): Merge conflict in src/auth.ts\nAutomatic merge failed; fix conflicts and then commit the result.\n".to_string(),
                stderr: String::new(),
            }),
        );

        let client = GitClient::new(Arc::new(mock));
        let result = client.merge_no_ff("feature/42-login").await;
        assert!(matches!(result, Err(GitError::MergeConflict)));
    }

    #[tokio::test]
    async fn test_changed_files_three_dot_range() {
        let mock = MockCommandExecutor::new().expect_command(
            "git",
            &["diff", "--name-only", "main...origin/feature/7-search"],
            ok_output("src/search.ts\ndocs/search.md\n"),
        );

        let client = GitClient::new(Arc::new(mock));
        let files = client
            .changed_files("main", "origin/feature/7-search", None)
            .await
            .unwrap();
        assert_eq!(files, vec!["src/search.ts", "docs/search.md"]);
    }

    #[tokio::test]
    async fn test_list_remote_branches_strips_prefix_and_head_alias() {
        let mock = MockCommandExecutor::new().expect_command(
            "git",
            &["branch", "-r", "--list", "origin/feature/12-*"],
            ok_output("  origin/feature/12-cache-layer\n  origin/HEAD -> origin/main\n"),
        );

        let client = GitClient::new(Arc::new(mock));
        let branches = client
            .list_remote_branches("origin", "feature/12-*")
            .await
            .unwrap();
        assert_eq!(branches, vec!["feature/12-cache-layer"]);
    }

    #[tokio::test]
    async fn test_grep_no_matches_is_empty() {
        let mock = MockCommandExecutor::new().expect_command(
            "git",
            &["grep", "-n", "-F", "-e", "const gone = 1;", "main", "--", "*.ts"],
            Ok(CommandOutput {
                status_code: 1,
                stdout: String::new(),
                stderr: String::new(),
            }),
        );

        let client = GitClient::new(Arc::new(mock));
        let matches = client
            .grep_literal("main", "const gone = 1;", &["*.ts"])
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_parse_worktree_list_porcelain() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\n\
                      worktree /repo/.worktrees/feature-42\nHEAD def456\nbranch refs/heads/feature/42-login\n\n\
                      worktree /repo/.worktrees/detached\nHEAD 789abc\ndetached\n";

        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].path, PathBuf::from("/repo/.worktrees/feature-42"));
        assert_eq!(entries[1].branch.as_deref(), Some("feature/42-login"));
        assert_eq!(entries[2].branch, None);
    }

    #[test]
    fn test_parse_grep_line_with_colons_in_content() {
        let parsed = parse_grep_line(
            "main:src/util.ts:14:const ratio: number = a / b;",
            "main:",
        )
        .unwrap();
        assert_eq!(parsed.file, "src/util.ts");
        assert_eq!(parsed.line, 14);
        assert_eq!(parsed.content, "const ratio: number = a / b;");
    }

    #[test]
    fn test_parse_grep_line_rejects_foreign_prefix() {
        assert!(parse_grep_line("other:src/a.ts:1:x", "main:").is_none());
    }
}

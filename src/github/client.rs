use super::errors::GitHubError;
use octocrab::Octocrab;

/// Thin GitHub client for the two API touchpoints this system has: looking
/// up a work item's title when no prior-run record supplies one, and posting
/// a per-item report slice as a comment on its review thread.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(token: String, owner: String, repo: String) -> Result<Self, GitHubError> {
        if owner.is_empty() || repo.is_empty() {
            return Err(GitHubError::ConfigNotFound(
                "GitHub owner/repo not configured".to_string(),
            ));
        }

        let octocrab = Octocrab::builder().personal_token(token).build()?;

        Ok(Self {
            octocrab,
            owner,
            repo,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Fetch the title of the issue tracking a work item.
    pub async fn fetch_issue_title(&self, item_id: u64) -> Result<String, GitHubError> {
        let issue = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .get(item_id)
            .await?;
        Ok(issue.title)
    }

    /// Post a comment on an item's review thread. PR comments use the same
    /// API as issue comments.
    pub async fn post_review_comment(
        &self,
        external_ref_id: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .create_comment(external_ref_id, body)
            .await?;

        println!("💬 Posted readiness report on #{external_ref_id}");
        Ok(())
    }
}

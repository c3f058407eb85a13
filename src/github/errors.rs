use octocrab::Error as OctocrabError;

#[derive(Debug)]
pub enum GitHubError {
    TokenNotFound(String),
    ConfigNotFound(String),
    ApiError(OctocrabError),
    IoError(std::io::Error),
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        GitHubError::ApiError(err)
    }
}

impl From<std::io::Error> for GitHubError {
    fn from(err: std::io::Error) -> Self {
        GitHubError::IoError(err)
    }
}

impl std::fmt::Display for GitHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHubError::TokenNotFound(msg) => {
                writeln!(f, "GitHub Authentication Error")?;
                write!(f, "🔑 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Use GitHub CLI: gh auth login")?;
                write!(f, "   → Or set token directly: export GITHUB_TOKEN=your_token")
            }
            GitHubError::ConfigNotFound(msg) => {
                writeln!(f, "GitHub Configuration Error")?;
                write!(f, "📂 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Set github.owner and github.repo in mergeready.toml")?;
                write!(f, "   → Or export MERGEREADY_GITHUB_OWNER / MERGEREADY_GITHUB_REPO")
            }
            GitHubError::ApiError(err) => {
                writeln!(f, "GitHub API Error")?;
                write!(f, "🌐 {err}\n\n")?;
                writeln!(f, "🔧 TROUBLESHOOTING:")?;
                writeln!(f, "   → Check authentication: gh auth status")?;
                write!(f, "   → Verify repository access: gh repo view")
            }
            GitHubError::IoError(err) => {
                writeln!(f, "File System Error")?;
                write!(f, "📁 {err}")
            }
        }
    }
}

impl std::error::Error for GitHubError {}

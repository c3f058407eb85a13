use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for mergeready
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeReadyConfig {
    /// GitHub configuration
    pub github: GitHubConfig,
    /// Repository layout and branch conventions
    pub repo: RepoConfig,
    /// Per-check settings
    pub checks: ChecksConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// GitHub API token (can be set via env var)
    pub token: Option<String>,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoConfig {
    /// The shared integration branch feature branches merge into
    pub trunk: String,
    /// Remote name used for fetch and remote-branch discovery
    pub remote: String,
    /// Branch naming convention prefix; item 42 lives on `feature/42-*`
    pub branch_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChecksConfig {
    pub mirroring: MirroringConfig,
    pub residual: ResidualConfig,
    pub combined: CombinedConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MirroringConfig {
    /// Directory pairs whose contents must evolve together
    #[serde(default)]
    pub pairs: Vec<MirrorPair>,
}

/// Two directories expected to change in lockstep, e.g. a packaged template
/// copy of a live config directory.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MirrorPair {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResidualConfig {
    /// Removed lines shorter than this are not worth scanning for
    pub min_pattern_length: usize,
    /// Cap on patterns scanned per branch, to bound whole-tree search cost
    pub max_patterns_per_branch: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CombinedConfig {
    /// The project's test command, e.g. "cargo test"
    pub test_command: String,
    /// The project's build command, e.g. "cargo build"
    pub build_command: String,
    /// Wall-clock bound on each of test/build, in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level when RUST_LOG is unset
    pub log_level: String,
    /// Directory where run reports are archived
    pub report_dir: String,
}

impl Default for MergeReadyConfig {
    fn default() -> Self {
        Self {
            github: GitHubConfig {
                token: None, // Will be read from env var
                owner: String::new(),
                repo: String::new(),
            },
            repo: RepoConfig {
                trunk: "main".to_string(),
                remote: "origin".to_string(),
                branch_prefix: "feature/".to_string(),
            },
            checks: ChecksConfig {
                mirroring: MirroringConfig::default(),
                residual: ResidualConfig {
                    min_pattern_length: 8,
                    max_patterns_per_branch: 50,
                },
                combined: CombinedConfig {
                    test_command: "cargo test".to_string(),
                    build_command: "cargo build".to_string(),
                    timeout_seconds: 120,
                },
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                report_dir: ".mergeready/reports".to_string(),
            },
        }
    }
}

impl MergeReadyConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (mergeready.toml)
    /// 3. Environment variables (prefixed with MERGEREADY_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&MergeReadyConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("mergeready.toml").exists() {
            builder = builder.add_source(File::with_name("mergeready"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MERGEREADY")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut merged: MergeReadyConfig = config.try_deserialize()?;

        // GitHub token can come from the ambient environment
        if merged.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                merged.github.token = Some(token);
            }
        }

        Ok(merged)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MergeReadyConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = MergeReadyConfig::load_env_file();
        MergeReadyConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MergeReadyConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

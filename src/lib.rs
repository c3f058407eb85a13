// Mergeready Library - Batch Merge-Readiness Checking
// This exposes the core components for testing and integration

pub mod checks;
pub mod config;
pub mod external;
pub mod github;
pub mod report;
pub mod resolver;
pub mod run_log;
pub mod telemetry;

// Re-export key types for easy access
pub use checks::{
    BatchVerdict, BranchCheckResult, BranchInfo, CheckFinding, CheckResult, CheckVerdict,
    ExtractedPattern, FileOverlap, MirrorDirection, OverlapKind, ResidualMatch, Severity,
    UnmirroredChange,
};
pub use checks::combined::CombinedBranchTester;
pub use checks::overlap::OverlapDetector;
pub use checks::residual::ResidualPatternScanner;
pub use config::{config, MergeReadyConfig, MirrorPair};
pub use external::{CommandExecutor, GitClient, ProcessCommandExecutor};
pub use github::{GitHubClient, GitHubError};
pub use report::MergeReport;
pub use resolver::BranchResolver;
pub use run_log::RunLogRecord;
pub use telemetry::{generate_run_id, init_telemetry};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mergeready::checks::{combined::CombinedBranchTester, mirroring, overlap::OverlapDetector,
    residual::ResidualPatternScanner};
use mergeready::config;
use mergeready::external::ProcessCommandExecutor;
use mergeready::github::GitHubClient;
use mergeready::resolver::BranchResolver;
use mergeready::{report, run_log, telemetry};

#[derive(Parser)]
#[command(name = "mergeready")]
#[command(about = "Batch merge-readiness checking for issue-driven feature branches")]
#[command(long_about = "Mergeready verifies that a batch of feature branches (one per tracked \
                       work item) will integrate cleanly into trunk: mirrored-directory drift, \
                       cross-branch overlap, residual removed patterns, and a real merge plus \
                       test/build on a disposable integration branch. Start with 'mergeready check'.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all readiness checks for a batch of work items and print the report
    Check {
        /// Work-item identifiers; read from the run log when omitted
        #[arg(value_name = "ITEM_ID")]
        items: Vec<u64>,
        /// Prior-run record supplying titles and review-thread numbers
        #[arg(long, help = "Path to a JSON run log with {item_id, title, external_ref_id} records")]
        run_log: Option<PathBuf>,
        /// Skip the merge + test/build integration check
        #[arg(long, help = "Run only the read-only checks; leave the working tree untouched")]
        skip_integration: bool,
        /// Post each item's report slice on its review thread
        #[arg(long, help = "Post per-item report comments via the GitHub API")]
        post_comments: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            println!("mergeready: batch merge-readiness checking");
            println!();
            println!("Run 'mergeready check 42 43 44' to check a batch of work items,");
            println!("or 'mergeready check --run-log run.json' to read the batch from a run log.");
            println!("See 'mergeready --help' for details.");
            Ok(())
        }
        Some(Commands::Check {
            items,
            run_log,
            skip_integration,
            post_comments,
        }) => {
            let exit_code = tokio::runtime::Runtime::new()?.block_on(async {
                check_command(items, run_log, skip_integration, post_comments).await
            })?;
            std::process::exit(exit_code);
        }
    }
}

async fn check_command(
    items: Vec<u64>,
    run_log_path: Option<PathBuf>,
    skip_integration: bool,
    post_comments: bool,
) -> Result<i32> {
    telemetry::init_telemetry()?;
    let cfg = config::config()?;
    let run_id = telemetry::generate_run_id();

    let records = match &run_log_path {
        Some(path) => run_log::load_if_present(path)?,
        None => Vec::new(),
    };

    let item_ids: Vec<u64> = if items.is_empty() {
        records.iter().map(|r| r.item_id).collect()
    } else {
        items
    };
    if item_ids.is_empty() {
        bail!("No work items given: pass item ids or --run-log");
    }

    let executor = Arc::new(ProcessCommandExecutor);
    let git = mergeready::GitClient::new(executor.clone());

    let github = match &cfg.github.token {
        Some(token) => {
            match GitHubClient::new(token.clone(), cfg.github.owner.clone(), cfg.github.repo.clone())
            {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "GitHub client unavailable, titles fall back to placeholders");
                    None
                }
            }
        }
        None => None,
    };

    println!("🔍 Checking merge readiness of {} item(s)", item_ids.len());

    let resolver = BranchResolver::new(
        &git,
        github.as_ref(),
        &cfg.repo.remote,
        &cfg.repo.trunk,
        &cfg.repo.branch_prefix,
    );
    let branches = resolver.resolve(&item_ids, &records).await;
    if branches.is_empty() {
        println!("⚠️  None of the {} item(s) resolved to a branch", item_ids.len());
    }

    // Read-only checks first; the integration tester needs the working tree
    // to itself and runs last.
    let mut checks = Vec::new();
    checks.push(mirroring::run(&branches, &cfg.checks.mirroring.pairs));

    let detector = OverlapDetector::new(&git, &cfg.repo.remote, &cfg.repo.trunk);
    checks.push(detector.run(&branches).await);

    let scanner =
        ResidualPatternScanner::new(&git, &cfg.repo.remote, &cfg.repo.trunk, &cfg.checks.residual);
    checks.push(scanner.run(&branches).await);

    if skip_integration {
        println!("⏭️  Skipping combined integration test (--skip-integration)");
    } else {
        let tester = CombinedBranchTester::new(
            &git,
            executor.clone(),
            &cfg.repo.remote,
            &cfg.repo.trunk,
            &cfg.checks.combined,
        );
        checks.push(tester.run(&branches).await);
    }

    let merge_report = report::build(Some(run_id), branches, checks);

    let markdown = report::format_report_markdown(&merge_report);
    println!();
    println!("{markdown}");

    match report::persist(&merge_report, std::path::Path::new(&cfg.observability.report_dir)) {
        Ok(path) => println!("📄 Report archived at {}", path.display()),
        Err(e) => tracing::warn!(error = %e, "Could not archive report"),
    }

    if post_comments {
        match &github {
            Some(client) => {
                let posted = report::post_reports(client, &merge_report).await;
                println!("💬 Posted {posted} report comment(s)");
            }
            None => println!("⚠️  --post-comments given but no GitHub token is configured"),
        }
    }

    println!("🏁 Batch verdict: {}", merge_report.batch_verdict);
    Ok(merge_report.batch_verdict.exit_code())
}

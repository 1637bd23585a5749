use anyhow::Result;
use clap::Parser;
use codesteward::branch::create_semantic_branch;
use codesteward::cli::{Cli, Commands, PipelineArgs};
use codesteward::config::StewardConfig;
use codesteward::pipeline::orchestrator::run_pipeline;
use codesteward::pipeline::{PipelineState, RunMode, StageContext};
use codesteward::services::template::TemplateSynthesizer;
use codesteward::services::vcs::GitAdapter;
use codesteward::services::{current_branch_or_env, VcsAdapter};
use codesteward::store::ArtifactStore;
use codesteward::CancelToken;
use colored::Colorize;
use log::debug;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Audit { args } => run_mode(RunMode::Audit, args),
        Commands::Full { args } => run_mode(RunMode::Full, args),
        Commands::Commit { args } => run_mode(RunMode::Commit, args),
        Commands::Pr { args } => run_mode(RunMode::Pr, args),
        Commands::Branch {
            intent,
            branch_type,
            no_commit,
        } => handle_branch(&intent, branch_type.map(|t| t.as_str()), no_commit),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}

fn run_mode(mode: RunMode, args: PipelineArgs) -> Result<()> {
    let root = args.path.canonicalize()?;
    let mut config = StewardConfig::load(&root)?;
    if let Some(output_dir) = &args.output_dir {
        config.workspace_dir = output_dir.clone();
    }

    let workspace = if config.workspace_dir.is_absolute() {
        config.workspace_dir.clone()
    } else {
        root.join(&config.workspace_dir)
    };
    let store = ArtifactStore::open(workspace)?;

    let vcs = match GitAdapter::open(&root) {
        Ok(adapter) => Some(adapter),
        Err(err) => {
            debug!("no VCS adapter available: {err}");
            None
        }
    };
    let source_branch = match &vcs {
        Some(adapter) => current_branch_or_env(adapter, &config.branch_fallback_env)
            .unwrap_or_else(|_| "HEAD".to_string()),
        None => "HEAD".to_string(),
    };

    let synthesis = TemplateSynthesizer;
    let cancel = CancelToken::new();
    let ctx = StageContext {
        root: &root,
        config: &config,
        store: &store,
        synthesis: &synthesis,
        vcs: vcs.as_ref().map(|a| a as &dyn VcsAdapter),
        cancel: &cancel,
    };

    let initial = PipelineState::new(mode, source_branch, args.target_branch, args.intent);
    let run = run_pipeline(initial, &ctx)?;

    println!(
        "{} {} pipeline finished, snapshot {}",
        "ok:".green().bold(),
        mode,
        run.state.snapshot_key.as_deref().unwrap_or("-")
    );
    for (name, path) in &run.state.artifacts {
        println!("  {name}: {}", path.display());
    }
    Ok(())
}

fn handle_branch(intent: &str, branch_type: Option<&str>, no_commit: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let adapter = GitAdapter::open(&root)?;
    let (name, created_type) =
        create_semantic_branch(&adapter, intent, branch_type, !no_commit)?;
    println!(
        "{} created branch {} ({})",
        "ok:".green().bold(),
        name.cyan(),
        created_type
    );
    Ok(())
}

/// Non-zero exit with the failing stage named on stderr; stage errors
/// already carry their stage name in the message.
fn report_failure(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "error:".red().bold());
}

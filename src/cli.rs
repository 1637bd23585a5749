use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "codesteward")]
#[command(about = "Source-tree auditor and autonomous code steward", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every pipeline mode.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Path to the repository or tree to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Base branch for comparison
    #[arg(long = "target-branch", visible_alias = "target", default_value = "main")]
    pub target_branch: String,

    /// Context or intent for the generated documents
    #[arg(short = 'm', long)]
    pub intent: Option<String>,

    /// Workspace directory override for published artifacts
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BranchTypeArg {
    Feat,
    Fix,
    Hotfix,
    Refactor,
    Perf,
    Docs,
    Test,
    Chore,
    Style,
    Ci,
    Build,
}

impl BranchTypeArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchTypeArg::Feat => "feat",
            BranchTypeArg::Fix => "fix",
            BranchTypeArg::Hotfix => "hotfix",
            BranchTypeArg::Refactor => "refactor",
            BranchTypeArg::Perf => "perf",
            BranchTypeArg::Docs => "docs",
            BranchTypeArg::Test => "test",
            BranchTypeArg::Chore => "chore",
            BranchTypeArg::Style => "style",
            BranchTypeArg::Ci => "ci",
            BranchTypeArg::Build => "build",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deep quality audit of the source tree
    Audit {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Full analysis with README synchronization and PR document
    Full {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Generate a commit message for the pending changes
    Commit {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Analyze changes and prepare a PR description
    Pr {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Create a semantic branch from an intent
    Branch {
        /// Branch purpose/intent
        #[arg(short = 'm', long, required = true)]
        intent: String,

        /// Override the detected branch type
        #[arg(short = 't', long = "type", value_enum)]
        branch_type: Option<BranchTypeArg>,

        /// Skip the initial marker commit
        #[arg(long)]
        no_commit: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_defaults_to_current_directory_and_main() {
        let cli = Cli::try_parse_from(["codesteward", "audit"]).unwrap();
        match cli.command {
            Commands::Audit { args } => {
                assert_eq!(args.path, PathBuf::from("."));
                assert_eq!(args.target_branch, "main");
                assert!(args.intent.is_none());
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn intent_and_target_parse_for_pr() {
        let cli = Cli::try_parse_from([
            "codesteward",
            "pr",
            "--target",
            "develop",
            "-m",
            "release prep",
        ])
        .unwrap();
        match cli.command {
            Commands::Pr { args } => {
                assert_eq!(args.target_branch, "develop");
                assert_eq!(args.intent.as_deref(), Some("release prep"));
            }
            _ => panic!("expected pr"),
        }
    }

    #[test]
    fn branch_requires_an_intent() {
        assert!(Cli::try_parse_from(["codesteward", "branch"]).is_err());
        let cli = Cli::try_parse_from([
            "codesteward",
            "branch",
            "-m",
            "fix auth crash",
            "--type",
            "fix",
            "--no-commit",
        ])
        .unwrap();
        match cli.command {
            Commands::Branch {
                intent,
                branch_type,
                no_commit,
            } => {
                assert_eq!(intent, "fix auth crash");
                assert_eq!(branch_type.unwrap().as_str(), "fix");
                assert!(no_commit);
            }
            _ => panic!("expected branch"),
        }
    }
}

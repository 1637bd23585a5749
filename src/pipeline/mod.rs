//! The stage pipeline and its shared state record.
//!
//! Stages never mutate state in place: each returns a fresh record and
//! the orchestrator retains every predecessor for audit. All I/O goes
//! through the injected interfaces on `StageContext`, so the state
//! machine itself performs none.

pub mod orchestrator;
pub mod stages;

use crate::config::StewardConfig;
use crate::core::errors::{Error, Result};
use crate::core::CancelToken;
use crate::services::{SynthesisService, VcsAdapter};
use crate::store::ArtifactStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Audit,
    Full,
    Commit,
    Pr,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunMode::Audit => "audit",
            RunMode::Full => "full",
            RunMode::Commit => "commit",
            RunMode::Pr => "pr",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageId {
    Architect,
    Steward,
    Tactician,
    Scribe,
}

impl StageId {
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Architect => "architect",
            StageId::Steward => "steward",
            StageId::Tactician => "tactician",
            StageId::Scribe => "scribe",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The record each stage consumes and reproduces. Payloads stay in the
/// artifact store; only keys and paths travel here.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub mode: RunMode,
    pub source_branch: String,
    pub target_branch: String,
    pub intent: Option<String>,
    pub file_set: Vec<PathBuf>,
    pub changed_files: Vec<PathBuf>,
    pub snapshot_key: Option<String>,
    /// Published artifact name -> location on disk.
    pub artifacts: BTreeMap<String, PathBuf>,
    /// Set by the Steward when actionable findings exist.
    pub changes_proposed: bool,
}

impl PipelineState {
    pub fn new(
        mode: RunMode,
        source_branch: impl Into<String>,
        target_branch: impl Into<String>,
        intent: Option<String>,
    ) -> Self {
        Self {
            mode,
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
            intent,
            file_set: Vec::new(),
            changed_files: Vec::new(),
            snapshot_key: None,
            artifacts: BTreeMap::new(),
            changes_proposed: false,
        }
    }

    pub fn snapshot_key(&self) -> Result<&str> {
        self.snapshot_key
            .as_deref()
            .ok_or_else(|| Error::Configuration("pipeline state carries no snapshot key".into()))
    }
}

/// Injected collaborators; the reason stages stay I/O-free themselves.
pub struct StageContext<'a> {
    pub root: &'a Path,
    pub config: &'a StewardConfig,
    pub store: &'a ArtifactStore,
    pub synthesis: &'a dyn SynthesisService,
    pub vcs: Option<&'a dyn VcsAdapter>,
    pub cancel: &'a CancelToken,
}

impl<'a> StageContext<'a> {
    pub fn vcs(&self) -> Result<&'a dyn VcsAdapter> {
        self.vcs
            .ok_or_else(|| Error::Configuration("this run requires a git repository".into()))
    }

    pub fn retry_policy(&self) -> crate::services::RetryPolicy {
        crate::services::RetryPolicy {
            attempts: self.config.synthesis.attempts,
            backoff: std::time::Duration::from_millis(self.config.synthesis.backoff_ms),
        }
    }
}

/// One unit of the sequential pipeline.
pub trait PipelineStage {
    fn id(&self) -> StageId;

    /// Consume the current state and produce its successor. The
    /// previous state is retained by the orchestrator.
    fn run(&self, state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState>;
}

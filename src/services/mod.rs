//! Injected interfaces to external collaborators.
//!
//! The pipeline never talks to a generative backend or a repository
//! directly; stages receive these traits. Synthesis calls carry only
//! structured findings and summaries, never raw source blobs.

pub mod template;
pub mod vcs;

use crate::core::Finding;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    CommitMessage,
    PrNarrative,
    RefactorPlan,
    AuditSummary,
    SystemOverview,
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PromptKind::CommitMessage => "commit-message",
            PromptKind::PrNarrative => "pr-narrative",
            PromptKind::RefactorPlan => "refactor-plan",
            PromptKind::AuditSummary => "audit-summary",
            PromptKind::SystemOverview => "system-overview",
        };
        write!(f, "{label}")
    }
}

/// One commit, summarized for synthesis context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub subject: String,
    pub author: String,
}

/// Structured context for a synthesis call.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SynthesisContext {
    pub intent: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub finding_counts: BTreeMap<String, usize>,
    pub findings: Vec<Finding>,
    pub changed_files: Vec<PathBuf>,
    pub commits: Vec<CommitSummary>,
    pub modules: Vec<String>,
}

impl SynthesisContext {
    /// Cap the embedded finding list; counts always cover everything.
    pub fn with_findings(mut self, findings: &[Finding], cap: usize) -> Self {
        for finding in findings {
            *self
                .finding_counts
                .entry(finding.kind.to_string())
                .or_insert(0) += 1;
        }
        self.findings = findings.iter().take(cap).cloned().collect();
        self
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("synthesis backend unavailable: {0}")]
    Unavailable(String),

    #[error("synthesis request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Whether a retry can possibly help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("HEAD is detached")]
    DetachedHead,

    #[error("branch `{0}` not found")]
    UnknownBranch(String),

    #[error("not inside a git repository")]
    NoRepository,

    #[error(transparent)]
    Backend(#[from] git2::Error),
}

/// Turns structured findings and summaries into prose.
pub trait SynthesisService: Send + Sync {
    fn synthesize(&self, kind: PromptKind, context: &SynthesisContext)
        -> Result<String, ServiceError>;
}

/// Version-control operations the pipeline needs.
pub trait VcsAdapter: Send + Sync {
    fn current_branch(&self) -> Result<String, VcsError>;
    fn branch_exists(&self, name: &str) -> Result<bool, VcsError>;
    fn create_branch(&self, name: &str) -> Result<(), VcsError>;
    fn list_changed_files(&self, base: &str) -> Result<Vec<PathBuf>, VcsError>;
    fn commits_since(&self, base: &str) -> Result<Vec<CommitSummary>, VcsError>;
    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<String, VcsError>;
}

/// Bounded retry for idempotent synthesis calls. Mutating VCS calls
/// must not go through this path.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

pub fn synthesize_with_retry(
    service: &dyn SynthesisService,
    kind: PromptKind,
    context: &SynthesisContext,
    policy: RetryPolicy,
) -> Result<String, ServiceError> {
    let attempts = policy.attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match service.synthesize(kind, context) {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!("{kind} synthesis attempt {attempt}/{attempts} failed: {err}");
                std::thread::sleep(policy.backoff * attempt);
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last.unwrap_or_else(|| ServiceError::Unavailable("no attempts made".to_string())))
}

/// Resolve the working branch, falling back to an environment-supplied
/// name when HEAD is detached (for example in a CI checkout).
pub fn current_branch_or_env(
    vcs: &dyn VcsAdapter,
    fallback_env: &str,
) -> Result<String, VcsError> {
    match vcs.current_branch() {
        Err(VcsError::DetachedHead) => {
            std::env::var(fallback_env).map_err(|_| VcsError::DetachedHead)
        }
        other => other,
    }
}

/// Strip any code fences a generative backend wrapped its output in.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```markdown")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open
        .trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(without_open.trim_start_matches('\n'));
    without_close.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: AtomicU32,
    }

    impl SynthesisService for Flaky {
        fn synthesize(
            &self,
            _kind: PromptKind,
            _context: &SynthesisContext,
        ) -> Result<String, ServiceError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ServiceError::Unavailable("busy".to_string()))
            } else {
                Ok("done".to_string())
            }
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn transient_failures_are_retried_within_the_bound() {
        let service = Flaky {
            failures: AtomicU32::new(2),
        };
        let result = synthesize_with_retry(
            &service,
            PromptKind::AuditSummary,
            &SynthesisContext::default(),
            fast_policy(3),
        );
        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn retries_stop_at_the_bound() {
        let service = Flaky {
            failures: AtomicU32::new(10),
        };
        let result = synthesize_with_retry(
            &service,
            PromptKind::AuditSummary,
            &SynthesisContext::default(),
            fast_policy(2),
        );
        assert!(result.is_err());
    }

    struct Rejecting;

    impl SynthesisService for Rejecting {
        fn synthesize(
            &self,
            _kind: PromptKind,
            _context: &SynthesisContext,
        ) -> Result<String, ServiceError> {
            Err(ServiceError::Rejected("bad request".to_string()))
        }
    }

    #[test]
    fn rejections_are_not_retried() {
        let result = synthesize_with_retry(
            &Rejecting,
            PromptKind::CommitMessage,
            &SynthesisContext::default(),
            fast_policy(5),
        );
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[test]
    fn fences_are_stripped_from_synthesized_output() {
        assert_eq!(strip_fences("```markdown\n# Title\n```"), "# Title");
        assert_eq!(strip_fences("plain text"), "plain text");
        assert_eq!(strip_fences("```\nbody\n```"), "body");
    }

    #[test]
    fn finding_counts_cover_all_findings_even_when_capped() {
        use crate::core::{FindingKind, Severity};
        let findings: Vec<_> = (0..5)
            .map(|i| crate::core::Finding {
                kind: FindingKind::DeadImport,
                file: PathBuf::from("a.py"),
                line: Some(i),
                severity: Severity::Warning,
                message: format!("finding {i}"),
            })
            .collect();
        let context = SynthesisContext::default().with_findings(&findings, 2);
        assert_eq!(context.findings.len(), 2);
        assert_eq!(context.finding_counts["dead-import"], 5);
    }
}

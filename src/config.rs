//! Tool configuration, loaded once from `codesteward.toml`.

use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Threshold policy applied by the aggregator and the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Cyclomatic complexity above this value is flagged
    #[serde(default = "default_complexity_threshold")]
    pub complexity: u32,

    /// Findings at or above this severity make the Steward propose fixes
    #[serde(default = "default_propose_fix")]
    pub propose_fix: Severity,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            complexity: default_complexity_threshold(),
            propose_fix: default_propose_fix(),
        }
    }
}

fn default_complexity_threshold() -> u32 {
    10
}

fn default_propose_fix() -> Severity {
    Severity::Major
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Bounded retry attempts for idempotent synthesis calls
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StewardConfig {
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Workspace directory for published artifacts
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Glob patterns excluded from analysis
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Environment variable consulted when HEAD is detached
    #[serde(default = "default_branch_env")]
    pub branch_fallback_env: String,

    /// Findings embedded verbatim in synthesis context (counts always
    /// cover the full set)
    #[serde(default = "default_context_findings_cap")]
    pub context_findings_cap: usize,
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            synthesis: SynthesisConfig::default(),
            workspace_dir: default_workspace_dir(),
            ignore: default_ignore(),
            branch_fallback_env: default_branch_env(),
            context_findings_cap: default_context_findings_cap(),
        }
    }
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".steward_workspace")
}

fn default_ignore() -> Vec<String> {
    vec![
        "**/venv/**".to_string(),
        "**/.venv/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/site-packages/**".to_string(),
    ]
}

fn default_branch_env() -> String {
    "CODESTEWARD_BRANCH".to_string()
}

fn default_context_findings_cap() -> usize {
    25
}

impl StewardConfig {
    /// Load from `codesteward.toml` under the given root, falling back
    /// to defaults when the file is absent.
    pub fn load(root: &Path) -> crate::core::errors::Result<Self> {
        let path = root.join("codesteward.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| {
            crate::core::errors::Error::Configuration(format!(
                "invalid {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StewardConfig::load(dir.path()).unwrap();
        assert_eq!(config.thresholds.complexity, 10);
        assert_eq!(config.thresholds.propose_fix, Severity::Major);
    }

    #[test]
    fn partial_file_keeps_unlisted_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("codesteward.toml"),
            "[thresholds]\ncomplexity = 6\n",
        )
        .unwrap();
        let config = StewardConfig::load(dir.path()).unwrap();
        assert_eq!(config.thresholds.complexity, 6);
        assert_eq!(config.synthesis.attempts, 3);
        assert_eq!(config.workspace_dir, PathBuf::from(".steward_workspace"));
    }

    #[test]
    fn invalid_file_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("codesteward.toml"), "thresholds = 3").unwrap();
        assert!(StewardConfig::load(dir.path()).is_err());
    }
}

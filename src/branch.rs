//! Semantic branch creation.
//!
//! Derives a `type/slug` branch name from the stated intent, with the
//! type auto-detected from intent keywords unless overridden.

use crate::core::errors::Result;
use crate::services::{VcsAdapter, VcsError};
use log::info;

pub const BRANCH_TYPES: &[&str] = &[
    "feat", "fix", "hotfix", "refactor", "perf", "docs", "test", "chore", "style", "ci", "build",
];

const SLUG_MAX: usize = 40;

/// Pick a branch type from intent keywords; `feat` when nothing matches.
pub fn detect_branch_type(intent: &str) -> &'static str {
    let lower = intent.to_lowercase();
    let rules: &[(&[&str], &'static str)] = &[
        (&["hotfix", "urgent", "emergency"], "hotfix"),
        (&["fix", "bug", "broken", "crash", "error"], "fix"),
        (&["refactor", "cleanup", "restructure", "simplify"], "refactor"),
        (&["perf", "performance", "speed", "optimize"], "perf"),
        (&["doc", "readme", "comment"], "docs"),
        (&["test", "coverage"], "test"),
        (&["style", "format", "lint"], "style"),
        (&["ci", "pipeline", "workflow"], "ci"),
        (&["build", "dependency", "upgrade"], "build"),
        (&["chore", "bump", "housekeeping"], "chore"),
    ];
    for (keywords, branch_type) in rules {
        if keywords.iter().any(|k| lower.contains(k)) {
            return branch_type;
        }
    }
    "feat"
}

/// Lowercased, dash-separated, truncated slug of the intent.
pub fn slugify(intent: &str) -> String {
    let mut slug = String::new();
    for ch in intent.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    match slug.char_indices().nth(SLUG_MAX) {
        Some((cut, _)) => slug[..cut].trim_end_matches('-').to_string(),
        None => slug,
    }
}

pub fn branch_name(branch_type: &str, intent: &str) -> String {
    format!("{branch_type}/{}", slugify(intent))
}

/// Create and switch to a semantic branch, optionally sealing it with
/// an initial marker commit. Creation is retried at most once, and
/// only after verifying the branch was not already created.
pub fn create_semantic_branch(
    vcs: &dyn VcsAdapter,
    intent: &str,
    override_type: Option<&str>,
    initial_commit: bool,
) -> Result<(String, &'static str)> {
    let branch_type = match override_type {
        Some(t) => BRANCH_TYPES
            .iter()
            .find(|known| **known == t)
            .copied()
            .ok_or_else(|| {
                crate::core::errors::Error::Configuration(format!("unknown branch type `{t}`"))
            })?,
        None => detect_branch_type(intent),
    };
    let name = branch_name(branch_type, intent);

    match vcs.create_branch(&name) {
        Ok(()) => {}
        Err(err) => {
            // Retry only when the first attempt verifiably did not apply
            if vcs.branch_exists(&name).map_err(crate::core::errors::Error::Vcs)? {
                return Err(VcsError::Backend(git2::Error::from_str(&format!(
                    "branch `{name}` already exists"
                )))
                .into());
            }
            info!("branch creation failed once ({err}), retrying");
            vcs.create_branch(&name).map_err(crate::core::errors::Error::Vcs)?;
        }
    }

    if initial_commit {
        vcs.stage_and_commit(&[], &format!("chore: start {name}"))
            .map_err(crate::core::errors::Error::Vcs)?;
    }

    Ok((name, branch_type))
}

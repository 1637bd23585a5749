//! The deterministic analysis engine, end to end.
//!
//! Discovers the file set, parses it in parallel, resolves the
//! dependency graph, scores complexity, runs dead-symbol detection and
//! aggregates everything into one snapshot, which is published to the
//! artifact store all-or-nothing: cancellation before publication
//! leaves no partial snapshot behind.

use crate::aggregate::build_snapshot;
use crate::analyzers::collect_structural_records;
use crate::config::StewardConfig;
use crate::core::errors::{Error, Result};
use crate::core::{AnalysisSnapshot, CancelToken};
use crate::io::walker::find_source_files;
use crate::store::ArtifactStore;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct AnalysisRun {
    pub snapshot: AnalysisSnapshot,
    pub files: Vec<PathBuf>,
}

/// Analyze the tree under `root` and publish the snapshot.
pub fn run_analysis(
    root: &Path,
    config: &StewardConfig,
    store: &ArtifactStore,
    cancel: &CancelToken,
) -> Result<AnalysisRun> {
    let files = find_source_files(root, &config.ignore)?;
    info!("analyzing {} source file(s) under {}", files.len(), root.display());

    let outcomes = collect_structural_records(root, &files, cancel)?;
    let snapshot = build_snapshot(&outcomes, &config.thresholds);

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let payload = serde_json::to_vec_pretty(&snapshot)?;
    store.put(&snapshot.run_key, &payload)?;
    info!(
        "published snapshot {} ({} finding(s))",
        snapshot.run_key,
        snapshot.findings.len()
    );

    Ok(AnalysisRun { snapshot, files })
}

/// Fetch a previously published snapshot by key.
pub fn load_snapshot(store: &ArtifactStore, key: &str) -> Result<AnalysisSnapshot> {
    let payload = store.get(key)?;
    Ok(serde_json::from_slice(&payload)?)
}

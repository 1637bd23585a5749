pub mod complexity;
pub mod dead_code;
pub mod parser;

use crate::core::errors::{Error, Result};
use crate::core::{CancelToken, ParseStatus, SourceUnit, StructuralRecord};
use crate::graph::module_identity;
use log::{debug, warn};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Result of analyzing one file. Units that failed to parse keep their
/// place in the set with an empty structural record, so one bad file
/// never aborts the run.
#[derive(Clone, Debug)]
pub struct UnitOutcome {
    pub record: StructuralRecord,
    /// SHA-256 of the file content; feeds the run key.
    pub content_hash: String,
    /// Parse or read error message when status is not `Ok`.
    pub error: Option<String>,
}

/// Parse the file set in parallel and collect the outcomes ordered by
/// path. This is the synchronization barrier before resolution: every
/// parse completes (or is isolated as a per-file failure) first.
pub fn collect_structural_records(
    root: &Path,
    files: &[PathBuf],
    cancel: &CancelToken,
) -> Result<Vec<UnitOutcome>> {
    let mut outcomes: Vec<UnitOutcome> = files
        .par_iter()
        .filter_map(|path| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(analyze_single_file(root, path))
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    outcomes.sort_by(|a, b| a.record.unit.path.cmp(&b.record.unit.path));
    Ok(outcomes)
}

fn analyze_single_file(root: &Path, path: &Path) -> UnitOutcome {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let (module, is_package) = module_identity(relative);

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("skipping unreadable file {}: {err}", relative.display());
            return UnitOutcome {
                record: empty_record(relative, &module, is_package, 0, ParseStatus::Skipped),
                content_hash: content_fingerprint(&[]),
                error: Some(err.to_string()),
            };
        }
    };
    let content_hash = content_fingerprint(content.as_bytes());

    match parser::parse_unit(relative, &module, is_package, &content) {
        Ok(record) => {
            debug!(
                "parsed {} ({} definitions, {} imports)",
                relative.display(),
                record.definitions.len(),
                record.imports.len()
            );
            UnitOutcome {
                record,
                content_hash,
                error: None,
            }
        }
        Err(err) => {
            warn!("parse failed for {}: {err}", relative.display());
            UnitOutcome {
                record: empty_record(
                    relative,
                    &module,
                    is_package,
                    content.len(),
                    ParseStatus::SyntaxError,
                ),
                content_hash,
                error: Some(err.to_string()),
            }
        }
    }
}

fn empty_record(
    path: &Path,
    module: &str,
    is_package: bool,
    bytes: usize,
    status: ParseStatus,
) -> StructuralRecord {
    StructuralRecord {
        unit: SourceUnit {
            path: path.to_path_buf(),
            module: module.to_string(),
            is_package,
            bytes,
            status,
        },
        definitions: Vec::new(),
        imports: Vec::new(),
        referenced_names: Default::default(),
        unreachable_lines: Vec::new(),
    }
}

pub fn content_fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

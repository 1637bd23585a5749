//! Module namespace and import resolution.
//!
//! Maps every import reference onto the tree's module namespace,
//! producing a directed edge per referencing pair. Refs that do not
//! match a known unit become unresolved edges pointing at an
//! external-library placeholder; only ascending past the analysis root
//! is an error, and even that is a finding rather than a crash.

pub mod cycles;

use crate::core::{
    DependencyEdge, Finding, FindingKind, ImportRef, ParseStatus, Severity, StructuralRecord,
};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Dotted module identity for a root-relative path, plus whether the
/// unit is a package (`__init__.py`).
pub fn module_identity(relative: &Path) -> (String, bool) {
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let file = segments.pop().unwrap_or_default();
    let stem = file.strip_suffix(".py").unwrap_or(&file).to_string();

    if stem == "__init__" && !segments.is_empty() {
        (segments.join("."), true)
    } else {
        segments.push(stem);
        (segments.join("."), false)
    }
}

/// Resolver output: deduplicated edges plus resolution-error findings.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub edges: Vec<DependencyEdge>,
    pub findings: Vec<Finding>,
}

/// Resolve every import reference in the parsed units. Units that
/// failed to parse contribute neither nodes nor edges.
pub fn resolve_dependencies<'a>(
    records: impl IntoIterator<Item = &'a StructuralRecord>,
) -> Resolution {
    let records: Vec<&StructuralRecord> = records.into_iter().collect();
    let namespace: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.unit.status == ParseStatus::Ok)
        .map(|r| r.unit.module.as_str())
        .collect();

    // Dedup by ordered pair; a resolved edge wins over an unresolved one
    let mut edges: BTreeMap<(String, String), bool> = BTreeMap::new();
    let mut findings = Vec::new();

    for record in records.iter().filter(|r| r.unit.status == ParseStatus::Ok) {
        let from = &record.unit.module;
        for import in &record.imports {
            match resolve_import(record, import, &namespace) {
                Ok(targets) => {
                    for (to, resolved) in targets {
                        let entry = edges.entry((from.clone(), to)).or_insert(resolved);
                        *entry = *entry || resolved;
                    }
                }
                Err(message) => {
                    debug!("{}: {message}", record.unit.path.display());
                    findings.push(Finding {
                        kind: FindingKind::InvalidRelativeImport,
                        file: record.unit.path.clone(),
                        line: Some(import.line),
                        severity: Severity::Warning,
                        message,
                    });
                }
            }
        }
    }

    Resolution {
        edges: edges
            .into_iter()
            .map(|((from, to), resolved)| DependencyEdge { from, to, resolved })
            .collect(),
        findings,
    }
}

/// Targets for one import ref: `(module, resolved)` pairs.
fn resolve_import(
    record: &StructuralRecord,
    import: &ImportRef,
    namespace: &BTreeSet<&str>,
) -> Result<Vec<(String, bool)>, String> {
    if import.level == 0 {
        if import.is_module_import {
            Ok(import
                .names
                .iter()
                .map(|name| resolve_absolute(&name.name, namespace))
                .collect())
        } else {
            Ok(resolve_from(&import.module, import, namespace))
        }
    } else {
        let base = ascend(record, import)?;
        let target = join_dotted(&base, &import.module);
        Ok(resolve_from(&target, import, namespace))
    }
}

fn resolve_absolute(spec: &str, namespace: &BTreeSet<&str>) -> (String, bool) {
    if namespace.contains(spec) {
        (spec.to_string(), true)
    } else {
        (head_segment(spec), false)
    }
}

/// Resolve a `from target import names` ref. A name that denotes a
/// submodule of the target resolves to that submodule's unit.
fn resolve_from(
    target: &str,
    import: &ImportRef,
    namespace: &BTreeSet<&str>,
) -> Vec<(String, bool)> {
    if import.wildcard || import.names.is_empty() {
        return vec![resolve_target_or_placeholder(target, None, namespace)];
    }

    let mut targets = Vec::new();
    for name in &import.names {
        let candidate = join_dotted(target, &name.name);
        if namespace.contains(candidate.as_str()) {
            targets.push((candidate, true));
        } else {
            targets.push(resolve_target_or_placeholder(target, Some(&name.name), namespace));
        }
    }
    targets
}

fn resolve_target_or_placeholder(
    target: &str,
    name: Option<&str>,
    namespace: &BTreeSet<&str>,
) -> (String, bool) {
    if !target.is_empty() && namespace.contains(target) {
        (target.to_string(), true)
    } else if !target.is_empty() {
        (head_segment(target), false)
    } else {
        // `from . import x` where neither the package nor x is known
        (head_segment(name.unwrap_or("?")), false)
    }
}

/// Apply the relative-import ascent: take the importing unit's own
/// package path and remove `level` segments (a package counts as its
/// own first level). Ascending past the root is an error.
fn ascend(record: &StructuralRecord, import: &ImportRef) -> Result<String, String> {
    let segments: Vec<&str> = record
        .unit
        .module
        .split('.')
        .filter(|s| !s.is_empty())
        .collect();
    let drop = import.level as usize + usize::from(!record.unit.is_package) - 1;
    if drop > segments.len() {
        return Err(format!(
            "relative import (level {}) ascends past the analysis root from `{}`",
            import.level, record.unit.module
        ));
    }
    Ok(segments[..segments.len() - drop].join("."))
}

fn join_dotted(base: &str, suffix: &str) -> String {
    match (base.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}.{suffix}"),
    }
}

fn head_segment(spec: &str) -> String {
    spec.split('.').next().unwrap_or(spec).to_string()
}

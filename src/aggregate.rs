//! Finding aggregation and snapshot assembly.
//!
//! The single merge point of the parallel analysis outputs. Policy
//! lives here: the measuring components never apply thresholds. The
//! run key is derived from the analyzed file set's content fingerprint,
//! never from wall-clock time, so identical inputs always produce the
//! identical snapshot key.

use crate::analyzers::complexity::{definition_id, score_classes, score_functions};
use crate::analyzers::{content_fingerprint, dead_code, UnitOutcome};
use crate::config::Thresholds;
use crate::core::{
    AnalysisSnapshot, Finding, FindingKind, ParseStatus, Severity,
};
use crate::graph::{cycles, resolve_dependencies, Resolution};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Content-addressed key for a run, over the sorted (path, hash) pairs
/// of the analyzed file set.
pub fn run_key(outcomes: &[UnitOutcome]) -> String {
    let mut entries: Vec<String> = outcomes
        .iter()
        .map(|o| {
            format!(
                "{}\u{0}{}",
                o.record.unit.path.display(),
                o.content_hash
            )
        })
        .collect();
    entries.sort_unstable();
    content_fingerprint(entries.join("\n").as_bytes())
}

/// Merge all analysis outputs into one immutable snapshot.
pub fn build_snapshot(outcomes: &[UnitOutcome], thresholds: &Thresholds) -> AnalysisSnapshot {
    let records: Vec<_> = outcomes.iter().map(|o| &o.record).collect();

    let resolution = resolve_dependencies(records.iter().copied());
    let functions = score_functions(records.iter().copied());
    let classes = score_classes(records.iter().copied());

    // Per-unit detection reads only its own record
    let detector_findings: Vec<Finding> = records
        .par_iter()
        .filter(|r| r.unit.status == ParseStatus::Ok)
        .flat_map(|r| dead_code::detect(r))
        .collect();

    let unit_paths: BTreeMap<String, PathBuf> = records
        .iter()
        .map(|r| (r.unit.module.clone(), r.unit.path.clone()))
        .collect();
    let Resolution { edges, findings } = resolution;
    let cycle_findings = cycles::detect_cycles(&edges, &unit_paths);

    let mut merged: BTreeSet<Finding> = BTreeSet::new();
    merged.extend(findings);
    merged.extend(detector_findings);
    merged.extend(cycle_findings);
    merged.extend(parse_error_findings(outcomes));
    merged.extend(complexity_findings(outcomes, thresholds));

    AnalysisSnapshot {
        run_key: run_key(outcomes),
        units: records.iter().map(|r| r.unit.clone()).collect(),
        edges,
        functions,
        classes,
        findings: merged.into_iter().collect(),
    }
}

fn parse_error_findings(outcomes: &[UnitOutcome]) -> Vec<Finding> {
    outcomes
        .iter()
        .filter(|o| o.record.unit.status == ParseStatus::SyntaxError)
        .map(|o| Finding {
            kind: FindingKind::ParseError,
            file: o.record.unit.path.clone(),
            line: None,
            severity: Severity::Major,
            message: o
                .error
                .clone()
                .unwrap_or_else(|| "source failed to parse".to_string()),
        })
        .collect()
}

/// Threshold policy for complexity. Severity scales with how far the
/// measurement exceeds the configured bound; the exact curve is policy,
/// kept configurable through the threshold itself.
fn complexity_findings(outcomes: &[UnitOutcome], thresholds: &Thresholds) -> Vec<Finding> {
    let mut findings = Vec::new();
    for outcome in outcomes {
        let record = &outcome.record;
        for def in record.definitions.iter().filter(|d| d.is_callable()) {
            let cyclomatic = 1 + def.decision_points;
            if cyclomatic <= thresholds.complexity {
                continue;
            }
            let excess = cyclomatic - thresholds.complexity;
            findings.push(Finding {
                kind: FindingKind::HighComplexity,
                file: record.unit.path.clone(),
                line: Some(def.start_line),
                severity: severity_for_excess(excess),
                message: format!(
                    "`{}` has cyclomatic complexity {} (threshold {}, +{} over)",
                    definition_id(&record.unit.module, &def.name),
                    cyclomatic,
                    thresholds.complexity,
                    excess
                ),
            });
        }
    }
    findings
}

fn severity_for_excess(excess: u32) -> Severity {
    match excess {
        0..=2 => Severity::Warning,
        3..=5 => Severity::Major,
        _ => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CancelToken;
    use indoc::indoc;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn outcomes_for(files: &[(&str, &str)]) -> Vec<UnitOutcome> {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            paths.push(path);
        }
        crate::analyzers::collect_structural_records(dir.path(), &paths, &CancelToken::new())
            .unwrap()
    }

    fn snapshot_for(files: &[(&str, &str)]) -> AnalysisSnapshot {
        build_snapshot(&outcomes_for(files), &Thresholds::default())
    }

    fn branchy_function(branches: usize) -> String {
        let mut source = String::from("def busy(x):\n");
        for i in 0..branches {
            source.push_str(&format!("    if x > {i}:\n        x -= 1\n"));
        }
        source.push_str("    return x\n");
        source
    }

    #[test]
    fn identical_inputs_yield_identical_run_keys_and_findings() {
        let files = [
            ("pkg/__init__.py", ""),
            ("pkg/a.py", "from . import b\n"),
            ("pkg/b.py", "from . import a\n"),
        ];
        let first = snapshot_for(&files);
        let second = snapshot_for(&files);
        assert_eq!(first.run_key, second.run_key);
        assert_eq!(first.findings, second.findings);
    }

    #[test]
    fn run_key_changes_with_content() {
        let before = snapshot_for(&[("a.py", "x = 1\n")]);
        let after = snapshot_for(&[("a.py", "x = 2\n")]);
        assert_ne!(before.run_key, after.run_key);
    }

    #[test]
    fn run_key_ignores_parse_order() {
        let forward = outcomes_for(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let reversed = outcomes_for(&[("b.py", "y = 2\n"), ("a.py", "x = 1\n")]);
        assert_eq!(run_key(&forward), run_key(&reversed));
    }

    #[test]
    fn cycle_between_two_modules_names_both_in_order() {
        let snapshot = snapshot_for(&[
            ("pkg/__init__.py", ""),
            ("pkg/a.py", "from . import b\n"),
            ("pkg/b.py", "from . import a\n"),
        ]);
        let cycle: Vec<_> = snapshot
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::Cycle)
            .collect();
        assert_eq!(cycle.len(), 1);
        assert!(cycle[0].message.contains("pkg.a, pkg.b"));
    }

    #[test]
    fn fifteen_branches_scales_severity_with_excess() {
        let source = branchy_function(15);
        let snapshot = snapshot_for(&[("hot.py", &source)]);
        let finding = snapshot
            .findings
            .iter()
            .find(|f| f.kind == FindingKind::HighComplexity)
            .expect("high-complexity finding");
        // cyclomatic 16, threshold 10 -> excess 6
        assert_eq!(finding.severity, Severity::Critical);
        assert!(finding.message.contains("+6 over"));
    }

    #[test]
    fn three_branches_produce_no_complexity_finding() {
        let source = branchy_function(3);
        let snapshot = snapshot_for(&[("calm.py", &source)]);
        assert!(snapshot
            .findings
            .iter()
            .all(|f| f.kind != FindingKind::HighComplexity));
    }

    #[test]
    fn syntax_error_unit_yields_parse_error_finding_only() {
        let snapshot = snapshot_for(&[
            ("good.py", "def ok():\n    return 1\n"),
            ("bad.py", "def broken(:\n"),
        ]);
        assert_eq!(snapshot.units.len(), 2);
        let parse_errors: Vec<_> = snapshot
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::ParseError)
            .collect();
        assert_eq!(parse_errors.len(), 1);
        assert_eq!(parse_errors[0].file, Path::new("bad.py"));
        assert!(snapshot
            .findings
            .iter()
            .all(|f| f.kind != FindingKind::UnreachableBlock));
    }

    #[test]
    fn identical_findings_are_deduplicated() {
        // Two imports binding the same dead name on the same line count once
        let snapshot = snapshot_for(&[(
            "dup.py",
            indoc! {"
                from json import dumps; from json import dumps
            "},
        )]);
        let dead: Vec<_> = snapshot
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::DeadImport)
            .collect();
        assert_eq!(dead.len(), 1);
    }
}

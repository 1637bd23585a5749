//! Dead-symbol and unreachable-block detection, per unit.
//!
//! Detection is local and syntactic only: an import is dead when its
//! bound name is read nowhere in the unit, and a block is unreachable
//! when it follows an unconditional terminator in the same block. No
//! interprocedural or data-flow reachability is attempted.

use crate::core::{Finding, FindingKind, Severity, StructuralRecord};

/// Raw detections for one unit; the aggregator turns these into the
/// final finding list.
pub fn detect(record: &StructuralRecord) -> Vec<Finding> {
    let mut findings = Vec::new();
    detect_dead_imports(record, &mut findings);
    detect_unreachable_blocks(record, &mut findings);
    findings
}

fn detect_dead_imports(record: &StructuralRecord, findings: &mut Vec<Finding>) {
    for import in &record.imports {
        if import.wildcard {
            // Cannot be proven unused; flagged as a lint instead
            findings.push(Finding {
                kind: FindingKind::WildcardImport,
                file: record.unit.path.clone(),
                line: Some(import.line),
                severity: Severity::Info,
                message: format!(
                    "wildcard import from `{}` hides which names are used",
                    display_target(import.level, &import.module)
                ),
            });
            continue;
        }
        for name in &import.names {
            let bound = name.bound_name();
            if !record.referenced_names.contains(bound) {
                findings.push(Finding {
                    kind: FindingKind::DeadImport,
                    file: record.unit.path.clone(),
                    line: Some(import.line),
                    severity: Severity::Warning,
                    message: format!("imported name `{bound}` is never used"),
                });
            }
        }
    }
}

fn detect_unreachable_blocks(record: &StructuralRecord, findings: &mut Vec<Finding>) {
    for &line in &record.unreachable_lines {
        findings.push(Finding {
            kind: FindingKind::UnreachableBlock,
            file: record.unit.path.clone(),
            line: Some(line),
            severity: Severity::Warning,
            message: "statement follows an unconditional return/raise/break/continue".to_string(),
        });
    }
}

fn display_target(level: u32, module: &str) -> String {
    let dots = ".".repeat(level as usize);
    format!("{dots}{module}")
}

//! Mermaid emitters for the dependency map and complexity heatmap.
//!
//! Pure formatting over a snapshot; no analysis logic.

use crate::core::AnalysisSnapshot;
use std::collections::BTreeMap;
use std::fmt::Write as _;

fn node_id(module: &str) -> String {
    module.replace(['.', '-'], "_")
}

/// Dependency map: resolved edges solid, external references dashed.
pub fn dependency_graph(snapshot: &AnalysisSnapshot) -> String {
    let mut doc = String::from("graph TD\n");
    for unit in &snapshot.units {
        let _ = writeln!(doc, "    {}[\"{}\"]", node_id(&unit.module), unit.module);
    }
    for edge in &snapshot.edges {
        let arrow = if edge.resolved { "-->" } else { "-.->" };
        let _ = writeln!(
            doc,
            "    {} {arrow} {}",
            node_id(&edge.from),
            node_id(&edge.to)
        );
    }
    let externals: Vec<&str> = snapshot
        .edges
        .iter()
        .filter(|e| !e.resolved)
        .map(|e| e.to.as_str())
        .collect();
    if !externals.is_empty() {
        let _ = writeln!(doc, "    classDef external stroke-dasharray: 5 5;");
        let mut unique: Vec<String> = externals.iter().map(|e| node_id(e)).collect();
        unique.sort();
        unique.dedup();
        let _ = writeln!(doc, "    class {} external;", unique.join(","));
    }
    doc
}

/// Complexity heatmap: one node per module, classed by the worst
/// cyclomatic score among its definitions.
pub fn complexity_heatmap(snapshot: &AnalysisSnapshot) -> String {
    let mut worst: BTreeMap<&str, u32> = BTreeMap::new();
    for (id, score) in &snapshot.functions {
        let module = id.split("::").next().unwrap_or(id);
        let entry = worst.entry(module).or_insert(0);
        *entry = (*entry).max(score.cyclomatic);
    }

    let mut doc = String::from("graph TD\n");
    for unit in &snapshot.units {
        let peak = worst.get(unit.module.as_str()).copied().unwrap_or(0);
        let _ = writeln!(
            doc,
            "    {}[\"{} (max {})\"]:::{}",
            node_id(&unit.module),
            unit.module,
            peak,
            heat_class(peak)
        );
    }
    doc.push_str("    classDef cool fill:#e8f5e9;\n");
    doc.push_str("    classDef warm fill:#fff8e1;\n");
    doc.push_str("    classDef hot fill:#ffebee;\n");
    doc
}

fn heat_class(peak: u32) -> &'static str {
    match peak {
        0..=5 => "cool",
        6..=10 => "warm",
        _ => "hot",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ComplexityScore, DependencyEdge, ParseStatus, SourceUnit,
    };
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn snapshot() -> AnalysisSnapshot {
        let mut functions = BTreeMap::new();
        functions.insert(
            "pkg.a::busy".to_string(),
            ComplexityScore {
                cyclomatic: 12,
                max_nesting: 3,
                line_count: 40,
            },
        );
        AnalysisSnapshot {
            run_key: "k".to_string(),
            units: vec![SourceUnit {
                path: PathBuf::from("pkg/a.py"),
                module: "pkg.a".to_string(),
                is_package: false,
                bytes: 10,
                status: ParseStatus::Ok,
            }],
            edges: vec![
                DependencyEdge {
                    from: "pkg.a".to_string(),
                    to: "pkg.b".to_string(),
                    resolved: true,
                },
                DependencyEdge {
                    from: "pkg.a".to_string(),
                    to: "requests".to_string(),
                    resolved: false,
                },
            ],
            functions,
            classes: BTreeMap::new(),
            findings: vec![],
        }
    }

    #[test]
    fn resolved_and_external_edges_render_differently() {
        let doc = dependency_graph(&snapshot());
        assert!(doc.contains("pkg_a --> pkg_b"));
        assert!(doc.contains("pkg_a -.-> requests"));
        assert!(doc.contains("class requests external"));
    }

    #[test]
    fn heatmap_classes_modules_by_peak_complexity() {
        let doc = complexity_heatmap(&snapshot());
        assert!(doc.contains("pkg_a[\"pkg.a (max 12)\"]:::hot"));
    }
}

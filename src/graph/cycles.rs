//! Dependency-cycle detection over resolved, intra-tree edges.
//!
//! Cycles are expected input, not bugs: each strongly connected
//! component larger than one node becomes a single finding listing its
//! members in lexicographic order, independent of parse order.

use crate::core::{DependencyEdge, Finding, FindingKind, Severity};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Detect cycles among resolved edges. `unit_paths` maps module ids to
/// their file paths for finding locations.
pub fn detect_cycles(
    edges: &[DependencyEdge],
    unit_paths: &BTreeMap<String, PathBuf>,
) -> Vec<Finding> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    // Unresolved edges point outside the tree and are excluded
    for edge in edges.iter().filter(|e| e.resolved) {
        let from = *nodes
            .entry(edge.from.as_str())
            .or_insert_with(|| graph.add_node(edge.from.as_str()));
        let to = *nodes
            .entry(edge.to.as_str())
            .or_insert_with(|| graph.add_node(edge.to.as_str()));
        graph.add_edge(from, to, ());
    }

    let mut findings = Vec::new();
    for component in tarjan_scc(&graph) {
        if component.len() < 2 {
            continue;
        }
        let mut members: Vec<&str> = component.iter().map(|&n| graph[n]).collect();
        members.sort_unstable();
        let first = members[0];
        findings.push(Finding {
            kind: FindingKind::Cycle,
            file: unit_paths
                .get(first)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(first)),
            line: None,
            severity: Severity::Warning,
            message: format!("modules form a dependency cycle: {}", members.join(", ")),
        });
    }
    findings.sort();
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, to: &str, resolved: bool) -> DependencyEdge {
        DependencyEdge {
            from: from.to_string(),
            to: to.to_string(),
            resolved,
        }
    }

    #[test]
    fn two_node_cycle_lists_members_lexicographically() {
        let edges = vec![edge("pkg.b", "pkg.a", true), edge("pkg.a", "pkg.b", true)];
        let findings = detect_cycles(&edges, &BTreeMap::new());
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "modules form a dependency cycle: pkg.a, pkg.b"
        );
    }

    #[test]
    fn membership_is_independent_of_edge_order() {
        let forward = vec![
            edge("a", "b", true),
            edge("b", "c", true),
            edge("c", "a", true),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(
            detect_cycles(&forward, &BTreeMap::new()),
            detect_cycles(&reversed, &BTreeMap::new())
        );
    }

    #[test]
    fn unresolved_edges_do_not_participate() {
        let edges = vec![edge("a", "requests", false), edge("requests", "a", false)];
        assert!(detect_cycles(&edges, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn self_loop_is_not_a_cycle_finding() {
        let edges = vec![edge("a", "a", true)];
        assert!(detect_cycles(&edges, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn disjoint_cycles_yield_one_finding_each() {
        let edges = vec![
            edge("a", "b", true),
            edge("b", "a", true),
            edge("x", "y", true),
            edge("y", "x", true),
            edge("a", "x", true),
        ];
        let findings = detect_cycles(&edges, &BTreeMap::new());
        assert_eq!(findings.len(), 2);
    }
}

//! Complexity scoring over structural records.
//!
//! Pure measurement, no policy: thresholds are applied by the
//! aggregator, never here.

use crate::core::{ClassScore, ComplexityScore, DefKind, StructuralRecord};
use std::collections::BTreeMap;

/// Stable identity of a definition across the whole run.
pub fn definition_id(module: &str, name: &str) -> String {
    format!("{module}::{name}")
}

/// Score every function and method in the given records.
/// Cyclomatic complexity is 1 + decision points strictly inside the
/// body; nested definitions are scored independently.
pub fn score_functions<'a>(
    records: impl IntoIterator<Item = &'a StructuralRecord>,
) -> BTreeMap<String, ComplexityScore> {
    let mut scores = BTreeMap::new();
    for record in records {
        for def in record.definitions.iter().filter(|d| d.is_callable()) {
            scores.insert(
                definition_id(&record.unit.module, &def.name),
                ComplexityScore {
                    cyclomatic: 1 + def.decision_points,
                    max_nesting: def.max_nesting,
                    line_count: def.line_count(),
                },
            );
        }
    }
    scores
}

/// Score every class: method count and cohesion, where cohesion is the
/// share of methods touching instance state. Classes with no methods
/// are fully cohesive by definition.
pub fn score_classes<'a>(
    records: impl IntoIterator<Item = &'a StructuralRecord>,
) -> BTreeMap<String, ClassScore> {
    let mut scores = BTreeMap::new();
    for record in records {
        for (index, class) in record
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind == DefKind::Class)
        {
            let methods: Vec<_> = record
                .definitions
                .iter()
                .filter(|d| d.kind == DefKind::Method && d.parent == Some(index))
                .collect();
            let cohesion = if methods.is_empty() {
                1.0
            } else {
                let touching = methods.iter().filter(|m| m.touches_instance_state).count();
                touching as f64 / methods.len() as f64
            };
            scores.insert(
                definition_id(&record.unit.module, &class.name),
                ClassScore {
                    method_count: methods.len(),
                    cohesion,
                },
            );
        }
    }
    scores
}

use crate::core::ComplexityScore;
use std::collections::BTreeMap;

pub fn calculate_average_complexity(functions: &BTreeMap<String, ComplexityScore>) -> f64 {
    if functions.is_empty() {
        return 0.0;
    }
    let total: u32 = functions.values().map(|s| s.cyclomatic).sum();
    f64::from(total) / functions.len() as f64
}

pub fn find_max_complexity(functions: &BTreeMap<String, ComplexityScore>) -> u32 {
    functions.values().map(|s| s.cyclomatic).max().unwrap_or(0)
}

pub fn count_high_complexity(
    functions: &BTreeMap<String, ComplexityScore>,
    threshold: u32,
) -> usize {
    functions
        .values()
        .filter(|s| s.cyclomatic > threshold)
        .count()
}

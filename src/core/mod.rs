pub mod errors;
pub mod metrics;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a source file fared during structural parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    Ok,
    SyntaxError,
    Skipped,
}

/// One analyzed file. The root-relative `path` is the unit's stable
/// identity; `module` is the dotted module id derived from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub module: String,
    pub is_package: bool,
    pub bytes: usize,
    pub status: ParseStatus,
}

/// A name bound by an import statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The identifier this import binds in the unit's namespace.
    /// `import a.b.c` binds `a`; `import a.b.c as x` binds `x`;
    /// `from m import n` binds `n`.
    pub fn bound_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// A single import statement inside a unit. Level 0 is absolute;
/// level N >= 1 ascends N package levels before appending `module`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    pub module: String,
    pub level: u32,
    pub line: usize,
    pub names: Vec<ImportedName>,
    pub wildcard: bool,
    /// True for `import a.b`, false for `from a import b`.
    pub is_module_import: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefKind {
    Function,
    Method,
    Class,
}

/// A function, method, or class definition. Definitions form a tree per
/// unit via `parent` indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Definition {
    pub kind: DefKind,
    /// Dotted name inside the unit, e.g. `Parser.parse` or `outer.inner`.
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Number of enclosing definitions at the definition site.
    pub depth: u32,
    /// Decision points strictly inside the body, nested defs excluded.
    pub decision_points: u32,
    /// Deepest compound-block nesting inside the body (flat body = 0).
    pub max_nesting: u32,
    pub parent: Option<usize>,
    /// For methods: whether the body touches an attribute of its receiver.
    pub touches_instance_state: bool,
}

impl Definition {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, DefKind::Function | DefKind::Method)
    }
}

/// The structural record of one parsed unit: everything downstream
/// analysis needs, with no executable semantics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuralRecord {
    pub unit: SourceUnit,
    pub definitions: Vec<Definition>,
    pub imports: Vec<ImportRef>,
    /// Identifiers read anywhere in the unit outside import statements.
    pub referenced_names: BTreeSet<String>,
    /// First line of each statement sequence that follows an
    /// unconditional terminator within the same block.
    pub unreachable_lines: Vec<usize>,
}

/// Directed module-to-module edge. Unresolved edges point at an
/// external-library placeholder named after the import's head segment.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub resolved: bool,
}

/// Derived metrics for one definition. Replaced wholesale whenever the
/// owning unit is reparsed, never mutated in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub cyclomatic: u32,
    pub max_nesting: u32,
    pub line_count: usize,
}

/// Per-class metrics. Cohesion is 1.0 for classes with no methods.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub method_count: usize,
    pub cohesion: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Major,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Major => "major",
            Severity::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    HighComplexity,
    DeadImport,
    WildcardImport,
    UnreachableBlock,
    Cycle,
    ParseError,
    InvalidRelativeImport,
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FindingKind::HighComplexity => "high-complexity",
            FindingKind::DeadImport => "dead-import",
            FindingKind::WildcardImport => "wildcard-import",
            FindingKind::UnreachableBlock => "unreachable-block",
            FindingKind::Cycle => "cycle",
            FindingKind::ParseError => "parse-error",
            FindingKind::InvalidRelativeImport => "invalid-relative-import",
        };
        write!(f, "{label}")
    }
}

/// A typed audit finding. Produced only by the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub severity: Severity,
    pub message: String,
}

/// The immutable result of one analysis run, identified by a
/// content-addressed run key and stored once in the artifact store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub run_key: String,
    pub units: Vec<SourceUnit>,
    pub edges: Vec<DependencyEdge>,
    pub functions: BTreeMap<String, ComplexityScore>,
    pub classes: BTreeMap<String, ClassScore>,
    pub findings: Vec<Finding>,
}

impl AnalysisSnapshot {
    /// Findings at or above the given severity.
    pub fn findings_at_least(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity >= severity)
    }
}

/// Cooperative cancellation token shared with in-flight parses.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_name_follows_alias_then_head_segment() {
        let plain = ImportedName {
            name: "os.path".to_string(),
            alias: None,
        };
        assert_eq!(plain.bound_name(), "os");

        let aliased = ImportedName {
            name: "os.path".to_string(),
            alias: Some("p".to_string()),
        };
        assert_eq!(aliased.bound_name(), "p");
    }

    #[test]
    fn severity_orders_from_info_to_critical() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Major);
        assert!(Severity::Major < Severity::Critical);
    }

    #[test]
    fn cancel_token_observed_across_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}

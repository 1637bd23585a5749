// Export modules for library usage
pub mod aggregate;
pub mod analyzers;
pub mod branch;
pub mod cli;
pub mod config;
pub mod core;
pub mod emit;
pub mod engine;
pub mod graph;
pub mod io;
pub mod pipeline;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use crate::core::{
    AnalysisSnapshot, CancelToken, ClassScore, ComplexityScore, DefKind, Definition,
    DependencyEdge, Finding, FindingKind, ImportRef, ImportedName, ParseStatus, Severity,
    SourceUnit, StructuralRecord,
};

pub use crate::core::errors::{Error, Result};

pub use crate::aggregate::{build_snapshot, run_key};
pub use crate::analyzers::{collect_structural_records, UnitOutcome};
pub use crate::engine::{load_snapshot, run_analysis, AnalysisRun};
pub use crate::graph::{module_identity, resolve_dependencies, Resolution};
pub use crate::pipeline::orchestrator::{run_pipeline, PipelineRun};
pub use crate::pipeline::{PipelineStage, PipelineState, RunMode, StageContext, StageId};
pub use crate::services::{
    current_branch_or_env, synthesize_with_retry, PromptKind, RetryPolicy, ServiceError,
    SynthesisContext, SynthesisService, VcsAdapter, VcsError,
};
pub use crate::store::ArtifactStore;

//! The four pipeline stages.
//!
//! Architect runs the deterministic analysis engine and publishes the
//! snapshot plus diagrams. Steward audits the snapshot and decides
//! whether fixes should be proposed. Tactician drafts the refactor
//! plan. Scribe produces the mode-specific documents. Synthesis always
//! completes (or fails the stage) before any document is published, so
//! no artifact ever references work that did not finish.

use super::{PipelineStage, PipelineState, RunMode, StageContext, StageId};
use crate::core::errors::Result;
use crate::core::Finding;
use crate::emit::{markdown, mermaid};
use crate::engine;
use crate::services::{
    strip_fences, synthesize_with_retry, PromptKind, SynthesisContext,
};
use log::{debug, info, warn};

pub struct Architect;

impl PipelineStage for Architect {
    fn id(&self) -> StageId {
        StageId::Architect
    }

    fn run(&self, state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
        let run = engine::run_analysis(ctx.root, ctx.config, ctx.store, ctx.cancel)?;

        let graph = mermaid::dependency_graph(&run.snapshot);
        let heatmap = mermaid::complexity_heatmap(&run.snapshot);
        let graph_path = ctx.store.publish_named("dependency_graph.mmd", &graph)?;
        let heatmap_path = ctx.store.publish_named("complexity_heatmap.mmd", &heatmap)?;

        let mut next = state.clone();
        next.file_set = run.files;
        next.snapshot_key = Some(run.snapshot.run_key.clone());
        next.artifacts
            .insert("dependency_graph".to_string(), graph_path);
        next.artifacts
            .insert("complexity_heatmap".to_string(), heatmap_path);
        Ok(next)
    }
}

pub struct Steward;

impl PipelineStage for Steward {
    fn id(&self) -> StageId {
        StageId::Steward
    }

    fn run(&self, state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
        let snapshot = engine::load_snapshot(ctx.store, state.snapshot_key()?)?;
        let actionable: Vec<Finding> = snapshot
            .findings_at_least(ctx.config.thresholds.propose_fix)
            .cloned()
            .collect();
        info!(
            "steward: {} finding(s), {} actionable at {} or above",
            snapshot.findings.len(),
            actionable.len(),
            ctx.config.thresholds.propose_fix
        );

        let context = SynthesisContext {
            intent: state.intent.clone(),
            source_branch: Some(state.source_branch.clone()),
            target_branch: Some(state.target_branch.clone()),
            ..Default::default()
        }
        .with_findings(&snapshot.findings, ctx.config.context_findings_cap);
        let summary =
            synthesize_with_retry(ctx.synthesis, PromptKind::AuditSummary, &context, ctx.retry_policy())?;

        let report = markdown::audit_report(&snapshot, &summary);
        let path = ctx.store.publish_named("audit_report.md", &report)?;

        let mut next = state.clone();
        next.changes_proposed = !actionable.is_empty();
        next.artifacts.insert("audit_report".to_string(), path);
        Ok(next)
    }
}

pub struct Tactician;

impl PipelineStage for Tactician {
    fn id(&self) -> StageId {
        StageId::Tactician
    }

    fn run(&self, state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
        let snapshot = engine::load_snapshot(ctx.store, state.snapshot_key()?)?;
        let actionable: Vec<Finding> = snapshot
            .findings_at_least(ctx.config.thresholds.propose_fix)
            .cloned()
            .collect();

        let context = SynthesisContext {
            intent: state.intent.clone(),
            ..Default::default()
        }
        .with_findings(&actionable, ctx.config.context_findings_cap);
        let plan = synthesize_with_retry(
            ctx.synthesis,
            PromptKind::RefactorPlan,
            &context,
            ctx.retry_policy(),
        )?;

        let path = ctx
            .store
            .publish_named("refactor_plan.md", &strip_fences(&plan))?;

        let mut next = state.clone();
        next.artifacts.insert("refactor_plan".to_string(), path);
        Ok(next)
    }
}

pub struct Scribe;

impl PipelineStage for Scribe {
    fn id(&self) -> StageId {
        StageId::Scribe
    }

    fn run(&self, state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
        match state.mode {
            RunMode::Audit => {
                debug!("scribe: audit mode, report already published");
                Ok(state.clone())
            }
            RunMode::Commit => write_commit_message(state, ctx),
            RunMode::Pr => write_pr_document(state, ctx),
            RunMode::Full => {
                let mut next = sync_readme(state, ctx)?;
                match write_pr_document(&next, ctx) {
                    Ok(with_pr) => next = with_pr,
                    // A full run outside a repository still syncs the README
                    Err(err) => warn!("scribe: skipping PR document: {err}"),
                }
                Ok(next)
            }
        }
    }
}

fn write_commit_message(state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
    let vcs = ctx.vcs()?;
    let changed = vcs.list_changed_files(&state.target_branch)?;

    let mut context = SynthesisContext {
        intent: state.intent.clone(),
        source_branch: Some(state.source_branch.clone()),
        target_branch: Some(state.target_branch.clone()),
        changed_files: changed.clone(),
        ..Default::default()
    };
    if let Ok(key) = state.snapshot_key() {
        let snapshot = engine::load_snapshot(ctx.store, key)?;
        context = context.with_findings(&snapshot.findings, ctx.config.context_findings_cap);
    }

    let message = synthesize_with_retry(
        ctx.synthesis,
        PromptKind::CommitMessage,
        &context,
        ctx.retry_policy(),
    )?;
    let path = ctx
        .store
        .publish_named("commit_message.txt", &strip_fences(&message))?;

    let mut next = state.clone();
    next.changed_files = changed;
    next.artifacts.insert("commit_message".to_string(), path);
    Ok(next)
}

fn write_pr_document(state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
    let vcs = ctx.vcs()?;
    let commits = vcs.commits_since(&state.target_branch)?;
    if commits.is_empty() {
        warn!("scribe: no commits between {} and HEAD", state.target_branch);
    }

    let mut context = SynthesisContext {
        intent: state.intent.clone(),
        source_branch: Some(state.source_branch.clone()),
        target_branch: Some(state.target_branch.clone()),
        commits,
        ..Default::default()
    };
    if let Ok(key) = state.snapshot_key() {
        let snapshot = engine::load_snapshot(ctx.store, key)?;
        context = context.with_findings(&snapshot.findings, ctx.config.context_findings_cap);
    }

    let narrative = synthesize_with_retry(
        ctx.synthesis,
        PromptKind::PrNarrative,
        &context,
        ctx.retry_policy(),
    )?;
    let document = markdown::pr_document(
        &state.source_branch,
        &state.target_branch,
        &strip_fences(&narrative),
    );
    let path = ctx.store.publish_named("pr_document.md", &document)?;

    let mut next = state.clone();
    next.artifacts.insert("pr_document".to_string(), path);
    Ok(next)
}

fn sync_readme(state: &PipelineState, ctx: &StageContext<'_>) -> Result<PipelineState> {
    let snapshot = engine::load_snapshot(ctx.store, state.snapshot_key()?)?;
    let context = SynthesisContext {
        modules: snapshot.units.iter().map(|u| u.module.clone()).collect(),
        ..Default::default()
    }
    .with_findings(&snapshot.findings, ctx.config.context_findings_cap);
    let overview = synthesize_with_retry(
        ctx.synthesis,
        PromptKind::SystemOverview,
        &context,
        ctx.retry_policy(),
    )?;

    let readme_path = ctx.root.join("README.md");
    let existing = std::fs::read_to_string(&readme_path).unwrap_or_default();
    let updated = markdown::sync_region(&existing, strip_fences(&overview).trim_end())?;
    std::fs::write(&readme_path, updated)?;
    info!("scribe: synced README region at {}", readme_path.display());

    let mut next = state.clone();
    next.artifacts.insert("readme".to_string(), readme_path);
    Ok(next)
}

//! Sequential stage orchestration.
//!
//! Transitions are strictly linear except the single conditional edge:
//! Steward hands off to Tactician only when it proposed changes, and
//! to Scribe directly otherwise. No two stages ever run concurrently;
//! each stage's external calls depend on its predecessor's committed
//! artifacts.

use super::stages::{Architect, Scribe, Steward, Tactician};
use super::{PipelineStage, PipelineState, StageContext, StageId};
use crate::core::errors::Result;
use log::info;

/// A completed run: the terminal state plus every intermediate state,
/// oldest first, for audit and rollback.
#[derive(Debug)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub history: im::Vector<PipelineState>,
}

pub fn run_pipeline(initial: PipelineState, ctx: &StageContext<'_>) -> Result<PipelineRun> {
    let mut history = im::Vector::new();
    history.push_back(initial.clone());

    let mut state = initial;
    let mut current = Some(StageId::Architect);
    while let Some(id) = current {
        info!("stage {id}: starting ({} mode)", state.mode);
        let stage = stage_for(id);
        let next = stage
            .run(&state, ctx)
            .map_err(|e| e.in_stage(id.name()))?;
        info!("stage {id}: complete");

        current = next_stage(id, &next);
        if let (StageId::Steward, Some(StageId::Scribe)) = (id, current) {
            info!("stage tactician: skipped, no actionable findings");
        }
        history.push_back(next.clone());
        state = next;
    }

    Ok(PipelineRun { state, history })
}

fn stage_for(id: StageId) -> Box<dyn PipelineStage> {
    match id {
        StageId::Architect => Box::new(Architect),
        StageId::Steward => Box::new(Steward),
        StageId::Tactician => Box::new(Tactician),
        StageId::Scribe => Box::new(Scribe),
    }
}

fn next_stage(id: StageId, state: &PipelineState) -> Option<StageId> {
    match id {
        StageId::Architect => Some(StageId::Steward),
        StageId::Steward if state.changes_proposed => Some(StageId::Tactician),
        StageId::Steward => Some(StageId::Scribe),
        StageId::Tactician => Some(StageId::Scribe),
        StageId::Scribe => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StewardConfig;
    use crate::core::CancelToken;
    use crate::pipeline::RunMode;
    use crate::services::template::TemplateSynthesizer;
    use crate::services::{
        PromptKind, ServiceError, SynthesisContext, SynthesisService,
    };
    use crate::store::ArtifactStore;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FailingService;

    impl SynthesisService for FailingService {
        fn synthesize(
            &self,
            _kind: PromptKind,
            _context: &SynthesisContext,
        ) -> std::result::Result<String, ServiceError> {
            Err(ServiceError::Unavailable("backend down".to_string()))
        }
    }

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        dir
    }

    fn quick_config() -> StewardConfig {
        let mut config = StewardConfig::default();
        config.synthesis.attempts = 1;
        config.synthesis.backoff_ms = 1;
        config
    }

    fn run(root: &Path, config: &StewardConfig, service: &dyn SynthesisService) -> Result<PipelineRun> {
        let store = ArtifactStore::open(root.join(".steward_workspace")).unwrap();
        let cancel = CancelToken::new();
        let ctx = StageContext {
            root,
            config,
            store: &store,
            synthesis: service,
            vcs: None,
            cancel: &cancel,
        };
        run_pipeline(
            PipelineState::new(RunMode::Audit, "work", "main", None),
            &ctx,
        )
    }

    fn hot_function() -> String {
        let mut source = String::from("def hot(x):\n");
        for i in 0..16 {
            source.push_str(&format!("    if x > {i}:\n        x -= 1\n"));
        }
        source.push_str("    return x\n");
        source
    }

    #[test]
    fn clean_tree_skips_the_tactician() {
        let dir = tree(&[("calm.py", "def calm():\n    return 1\n")]);
        let config = quick_config();
        let run = run(dir.path(), &config, &TemplateSynthesizer).unwrap();

        // initial, architect, steward, scribe
        assert_eq!(run.history.len(), 4);
        assert!(!run.state.changes_proposed);
        assert!(!run.state.artifacts.contains_key("refactor_plan"));
        assert!(run.state.artifacts.contains_key("audit_report"));
    }

    #[test]
    fn actionable_findings_route_through_the_tactician() {
        let source = hot_function();
        let dir = tree(&[("hot.py", &source)]);
        let config = quick_config();
        let run = run(dir.path(), &config, &TemplateSynthesizer).unwrap();

        assert_eq!(run.history.len(), 5);
        assert!(run.state.changes_proposed);
        let plan = run.state.artifacts.get("refactor_plan").unwrap();
        assert!(plan.exists());
    }

    #[test]
    fn every_prior_state_is_retained_for_audit() {
        let dir = tree(&[("calm.py", "x = 1\n")]);
        let config = quick_config();
        let run = run(dir.path(), &config, &TemplateSynthesizer).unwrap();

        assert!(run.history[0].snapshot_key.is_none());
        assert!(run.history[1].snapshot_key.is_some());
        assert_eq!(
            run.history.last().unwrap().snapshot_key,
            run.state.snapshot_key
        );
    }

    #[test]
    fn synthesis_failure_halts_in_the_failing_stage() {
        let dir = tree(&[("calm.py", "x = 1\n")]);
        let config = quick_config();
        let err = run(dir.path(), &config, &FailingService).unwrap_err();
        assert_eq!(err.failing_stage(), Some("steward"));
    }

    #[test]
    fn snapshot_survives_even_when_a_later_stage_fails() {
        let dir = tree(&[("calm.py", "x = 1\n")]);
        let config = quick_config();
        let _ = run(dir.path(), &config, &FailingService).unwrap_err();

        // The architect's published snapshot remains readable
        let store = ArtifactStore::open(dir.path().join(".steward_workspace")).unwrap();
        let snapshots: Vec<_> = fs::read_dir(store.root().join("snapshots"))
            .unwrap()
            .collect();
        assert_eq!(snapshots.len(), 1);
    }
}

//! Deterministic synthesis provider.
//!
//! Renders every prompt kind from the structured context alone, so the
//! tool works with no generative backend configured. A generative
//! provider implements the same trait and is selected per stage by the
//! embedder.

use super::{PromptKind, ServiceError, SynthesisContext, SynthesisService};
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateSynthesizer;

impl SynthesisService for TemplateSynthesizer {
    fn synthesize(
        &self,
        kind: PromptKind,
        context: &SynthesisContext,
    ) -> Result<String, ServiceError> {
        let text = match kind {
            PromptKind::CommitMessage => commit_message(context),
            PromptKind::PrNarrative => pr_narrative(context),
            PromptKind::RefactorPlan => refactor_plan(context),
            PromptKind::AuditSummary => audit_summary(context),
            PromptKind::SystemOverview => system_overview(context),
        };
        Ok(text)
    }
}

fn total_findings(context: &SynthesisContext) -> usize {
    context.finding_counts.values().sum()
}

fn commit_message(context: &SynthesisContext) -> String {
    let scope = context
        .changed_files
        .first()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let subject = context
        .intent
        .clone()
        .unwrap_or_else(|| "general improvements".to_string());
    let type_ = if total_findings(context) > 0 {
        "fix"
    } else {
        "chore"
    };

    let mut message = match scope {
        Some(scope) => format!("{type_}({scope}): {subject}\n"),
        None => format!("{type_}: {subject}\n"),
    };
    if !context.changed_files.is_empty() {
        message.push('\n');
        let _ = writeln!(message, "Touches {} file(s).", context.changed_files.len());
    }
    if total_findings(context) > 0 {
        let _ = writeln!(
            message,
            "Addresses {} audit finding(s).",
            total_findings(context)
        );
    }
    message.trim_end().to_string()
}

fn pr_narrative(context: &SynthesisContext) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "## 1. Overview");
    let _ = writeln!(
        doc,
        "This change set carries {} commit(s).",
        context.commits.len()
    );
    if let Some(intent) = &context.intent {
        let _ = writeln!(doc, "Stated intent: {intent}.");
    }
    let _ = writeln!(doc, "\n## 2. Commits");
    for commit in &context.commits {
        let _ = writeln!(doc, "- {}: {} ({})", commit.hash, commit.subject, commit.author);
    }
    if total_findings(context) > 0 {
        let _ = writeln!(doc, "\n## 3. Code Quality Audit");
        for (kind, count) in &context.finding_counts {
            let _ = writeln!(doc, "- {kind}: {count}");
        }
    }
    doc
}

fn refactor_plan(context: &SynthesisContext) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Refactor Plan");
    let _ = writeln!(
        doc,
        "\n{} actionable finding(s) drive this plan.\n",
        context.findings.len()
    );
    for (index, finding) in context.findings.iter().enumerate() {
        let location = match finding.line {
            Some(line) => format!("{}:{line}", finding.file.display()),
            None => finding.file.display().to_string(),
        };
        let _ = writeln!(
            doc,
            "{}. [{}] {location}: {}",
            index + 1,
            finding.severity,
            finding.message
        );
    }
    doc
}

fn audit_summary(context: &SynthesisContext) -> String {
    let mut doc = String::new();
    let total = total_findings(context);
    if total == 0 {
        let _ = writeln!(doc, "The audit surfaced no findings.");
        return doc;
    }
    let _ = writeln!(doc, "The audit surfaced {total} finding(s):");
    for (kind, count) in &context.finding_counts {
        let _ = writeln!(doc, "- {kind}: {count}");
    }
    doc
}

fn system_overview(context: &SynthesisContext) -> String {
    let mut doc = String::new();
    let _ = writeln!(
        doc,
        "The tree contains {} analyzed module(s).",
        context.modules.len()
    );
    for module in &context.modules {
        let _ = writeln!(doc, "- `{module}`");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn commit_message_is_conventional() {
        let context = SynthesisContext {
            intent: Some("tighten parser error paths".to_string()),
            changed_files: vec![PathBuf::from("src/parser.py")],
            ..Default::default()
        };
        let message = TemplateSynthesizer
            .synthesize(PromptKind::CommitMessage, &context)
            .unwrap();
        assert!(message.starts_with("chore(src): tighten parser error paths"));
    }

    #[test]
    fn identical_context_renders_identical_text() {
        let context = SynthesisContext {
            intent: Some("stable".to_string()),
            ..Default::default()
        };
        let a = TemplateSynthesizer
            .synthesize(PromptKind::PrNarrative, &context)
            .unwrap();
        let b = TemplateSynthesizer
            .synthesize(PromptKind::PrNarrative, &context)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_audit_renders_a_clean_bill() {
        let summary = TemplateSynthesizer
            .synthesize(PromptKind::AuditSummary, &SynthesisContext::default())
            .unwrap();
        assert!(summary.contains("no findings"));
    }
}

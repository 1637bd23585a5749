//! Markdown document emitters: audit report, PR document, and the
//! README auto-sync region.

use crate::core::errors::Result;
use crate::core::metrics::{
    calculate_average_complexity, count_high_complexity, find_max_complexity,
};
use crate::core::{AnalysisSnapshot, ParseStatus};
use chrono::Utc;
use std::fmt::Write as _;

pub const SYNC_BEGIN: &str = "<!-- steward:begin -->";
pub const SYNC_END: &str = "<!-- steward:end -->";

/// Full audit report for one snapshot.
pub fn audit_report(snapshot: &AnalysisSnapshot, summary: &str) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Audit Report");
    let _ = writeln!(doc, "\nSnapshot: `{}`\n", snapshot.run_key);
    let _ = writeln!(doc, "{summary}");

    let parsed = snapshot
        .units
        .iter()
        .filter(|u| u.status == ParseStatus::Ok)
        .count();
    let _ = writeln!(doc, "\n## Summary\n");
    let _ = writeln!(doc, "| Metric | Value |");
    let _ = writeln!(doc, "|--------|-------|");
    let _ = writeln!(doc, "| Units analyzed | {} |", parsed);
    let _ = writeln!(doc, "| Units total | {} |", snapshot.units.len());
    let _ = writeln!(doc, "| Dependency edges | {} |", snapshot.edges.len());
    let _ = writeln!(
        doc,
        "| Average complexity | {:.1} |",
        calculate_average_complexity(&snapshot.functions)
    );
    let _ = writeln!(
        doc,
        "| Max complexity | {} |",
        find_max_complexity(&snapshot.functions)
    );
    let _ = writeln!(
        doc,
        "| High-complexity functions | {} |",
        count_high_complexity(&snapshot.functions, 10)
    );

    if !snapshot.findings.is_empty() {
        let _ = writeln!(doc, "\n## Findings\n");
        let _ = writeln!(doc, "| Kind | Severity | Location | Message |");
        let _ = writeln!(doc, "|------|----------|----------|---------|");
        for finding in &snapshot.findings {
            let location = match finding.line {
                Some(line) => format!("{}:{line}", finding.file.display()),
                None => finding.file.display().to_string(),
            };
            let _ = writeln!(
                doc,
                "| {} | {} | {} | {} |",
                finding.kind, finding.severity, location, finding.message
            );
        }
    }
    doc
}

/// PR document: generated header plus the synthesized narrative.
pub fn pr_document(source_branch: &str, target_branch: &str, body: &str) -> String {
    let now = Utc::now().format("%Y-%m-%d %H:%M");
    format!(
        "# Pull Request Documentation\n\n\
         **Generated:** {now}\n\
         **Source:** {source_branch} -> **Target:** {target_branch}\n\n\
         ---\n\n\
         {body}"
    )
}

/// Rewrite the auto-synced region of a document in place, leaving the
/// surrounding content untouched. Missing markers append the region.
pub fn sync_region(existing: &str, generated: &str) -> Result<String> {
    let region = format!("{SYNC_BEGIN}\n{generated}\n{SYNC_END}");
    match (existing.find(SYNC_BEGIN), existing.find(SYNC_END)) {
        (Some(start), Some(end)) if end >= start => {
            let after = end + SYNC_END.len();
            Ok(format!(
                "{}{}{}",
                &existing[..start],
                region,
                &existing[after..]
            ))
        }
        _ => {
            let mut updated = existing.to_string();
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push('\n');
            updated.push_str(&region);
            updated.push('\n');
            Ok(updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn empty_snapshot() -> AnalysisSnapshot {
        AnalysisSnapshot {
            run_key: "abc".to_string(),
            units: vec![],
            edges: vec![],
            functions: BTreeMap::new(),
            classes: BTreeMap::new(),
            findings: vec![],
        }
    }

    #[test]
    fn report_carries_run_key_and_summary() {
        let doc = audit_report(&empty_snapshot(), "All clear.");
        assert!(doc.contains("`abc`"));
        assert!(doc.contains("All clear."));
    }

    #[test]
    fn sync_replaces_existing_region_in_place() {
        let existing = format!(
            "# Project\n\nIntro.\n\n{SYNC_BEGIN}\nold content\n{SYNC_END}\n\nOutro.\n"
        );
        let updated = sync_region(&existing, "new content").unwrap();
        assert!(updated.contains("new content"));
        assert!(!updated.contains("old content"));
        assert!(updated.starts_with("# Project\n\nIntro.\n\n"));
        assert!(updated.ends_with("\n\nOutro.\n"));
    }

    #[test]
    fn sync_appends_when_markers_are_missing() {
        let updated = sync_region("# Bare readme\n", "generated").unwrap();
        assert!(updated.starts_with("# Bare readme\n"));
        assert!(updated.contains(SYNC_BEGIN));
        assert!(updated.contains("generated"));
        assert!(updated.trim_end().ends_with(SYNC_END));
    }

    #[test]
    fn syncing_twice_is_stable() {
        let once = sync_region("readme\n", "content").unwrap();
        let twice = sync_region(&once, "content").unwrap();
        assert_eq!(once, twice);
    }
}

//! Text and JSON summaries for CLI output.
//!
//! This module shapes snapshots and autopilot reports into human-readable lines
//! for text mode, or serializable structs for `--json`.

use crate::model::Snapshot;
use crate::orchestrator::{AutopilotReport, CandidateVerdict};
use crate::workflow::{format_score, tier, ScoreTier, Step};
use serde::Serialize;
use std::path::PathBuf;

/// Serializable view of a snapshot. Image payloads are reduced to their sizes.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub step: Step,
    pub main_image_bytes: Option<usize>,
    pub person_image_bytes: Option<usize>,
    pub annotated_image_bytes: Option<usize>,
    pub main_filename: Option<String>,
    pub person_filename: Option<String>,
    pub similarity_score: Option<f64>,
    pub similarity_display: Option<String>,
    pub tier: Option<ScoreTier>,
    pub remaining_candidates: Option<u64>,
}

impl SnapshotSummary {
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            step: Step::infer(snapshot),
            main_image_bytes: snapshot.main_image.as_ref().map(|b| b.len()),
            person_image_bytes: snapshot.person_image.as_ref().map(|b| b.len()),
            annotated_image_bytes: snapshot.annotated_image.as_ref().map(|b| b.len()),
            main_filename: snapshot.main_filename.clone(),
            person_filename: snapshot.person_filename.clone(),
            similarity_score: snapshot.similarity_score,
            similarity_display: snapshot.similarity_score.map(format_score),
            tier: snapshot.similarity_score.map(tier),
            remaining_candidates: snapshot.remaining_candidates,
        }
    }
}

/// Pre-formatted lines for text output.
pub struct TextSummary {
    pub lines: Vec<String>,
}

fn image_line(label: &str, bytes: Option<usize>, name: Option<&str>) -> String {
    match (bytes, name) {
        (Some(b), Some(n)) => format!("{label}: {n} ({b} bytes)"),
        (Some(b), None) => format!("{label}: {b} bytes"),
        _ => format!("{label}: -"),
    }
}

pub fn build_text_summary(summary: &SnapshotSummary) -> TextSummary {
    let mut lines = vec![format!("Step: {} ({:?})", summary.step.title(), summary.step)];
    lines.push(image_line(
        "Scene",
        summary.main_image_bytes,
        summary.main_filename.as_deref(),
    ));
    lines.push(image_line(
        "Person",
        summary.person_image_bytes,
        summary.person_filename.as_deref(),
    ));
    lines.push(image_line("Annotated", summary.annotated_image_bytes, None));
    match (&summary.similarity_display, summary.tier) {
        (Some(d), Some(t)) => lines.push(format!("Similarity: {d} ({})", t.label())),
        _ => lines.push("Similarity: -".into()),
    }
    lines.push(format!(
        "Remaining candidates: {}",
        summary
            .remaining_candidates
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into())
    ));
    TextSummary { lines }
}

/// Outcome of `bluree run`, printed with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub step: Step,
    pub detected: Option<u64>,
    pub candidates: Vec<CandidateVerdict>,
    pub accepted_score: Option<String>,
    pub saved_to: Option<PathBuf>,
    pub result_bytes: Option<usize>,
}

impl RunSummary {
    pub fn new(report: &AutopilotReport, saved_to: Option<PathBuf>) -> Self {
        Self {
            step: report.final_step,
            detected: report.detected,
            candidates: report.verdicts.clone(),
            accepted_score: report
                .verdicts
                .iter()
                .find(|v| v.accepted)
                .and_then(|v| v.display.clone()),
            saved_to,
            result_bytes: report.result.as_ref().map(|b| b.len()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(n) = self.detected {
            lines.push(format!("Detected: {n} candidate(s)"));
        }
        lines.push(format!("Candidates checked: {}", self.candidates.len()));
        if let Some(score) = self.accepted_score.as_deref() {
            lines.push(format!("Accepted match: {score}"));
        }
        if let Some(path) = self.saved_to.as_ref() {
            lines.push(format!("Saved: {}", path.display()));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_sizes_and_tier() {
        let snapshot = Snapshot {
            main_image: Some(vec![0u8; 12].into()),
            person_image: Some(vec![0u8; 3].into()),
            annotated_image: Some(vec![0u8; 7].into()),
            similarity_score: Some(0.55),
            remaining_candidates: Some(2),
            main_filename: Some("scene.jpg".into()),
            ..Default::default()
        };
        let summary = SnapshotSummary::new(&snapshot);
        assert_eq!(summary.step, Step::AwaitingMatchDecision);
        assert_eq!(summary.tier, Some(ScoreTier::Mid));

        let text = build_text_summary(&summary);
        assert!(text.lines.contains(&"Scene: scene.jpg (12 bytes)".to_string()));
        assert!(text.lines.contains(&"Person: 3 bytes".to_string()));
        assert!(text.lines.contains(&"Similarity: 55.00% (borderline)".to_string()));
        assert!(text.lines.contains(&"Remaining candidates: 2".to_string()));
    }

    #[test]
    fn empty_snapshot_prints_placeholders() {
        let summary = SnapshotSummary::new(&Snapshot::default());
        let text = build_text_summary(&summary);
        assert_eq!(summary.step, Step::Idle);
        assert!(text.lines.contains(&"Annotated: -".to_string()));
        assert!(text.lines.contains(&"Similarity: -".to_string()));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["similarity_score"].is_null());
        assert_eq!(json["step"], "Idle");
    }
}

//! Unattended run: upload both images, detect, walk the candidates and apply
//! the chosen transform to the first one that clears the score threshold.

use crate::backend::Backend;
use crate::model::{ImageSlot, ProcessAction};
use crate::workflow::{
    format_score, score::percentage, tier, ScoreTier, Step, Transition, WorkflowController,
    STATE_FETCH_FAILED,
};
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UploadSource {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct AutopilotPlan {
    pub scene: UploadSource,
    pub person: UploadSource,
    pub action: ProcessAction,
    /// Candidates are accepted only when strictly above this score.
    pub min_score: f64,
    pub max_rounds: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateVerdict {
    pub round: usize,
    pub score: Option<f64>,
    pub display: Option<String>,
    pub tier: Option<ScoreTier>,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct AutopilotReport {
    pub detected: Option<u64>,
    pub verdicts: Vec<CandidateVerdict>,
    pub final_step: Step,
    /// Processed image, present only when a candidate was accepted.
    pub result: Option<Bytes>,
}

pub async fn drive<B: Backend>(
    controller: &mut WorkflowController<B>,
    plan: AutopilotPlan,
    mut progress: impl FnMut(String),
) -> Result<AutopilotReport> {
    let threshold = percentage(plan.min_score);

    for (slot, source) in [(ImageSlot::Scene, plan.scene), (ImageSlot::Person, plan.person)] {
        progress(format!("Uploading {} ({})…", slot.label(), source.file_name));
        controller
            .upload(slot, &source.file_name, source.bytes)
            .await
            .context(Transition::Upload(slot).failure_message())?;
    }
    if controller.step() != Step::ImagesUploaded {
        bail!("server did not report both images after upload");
    }

    progress("Detecting human figures…".into());
    controller
        .request_detection()
        .await
        .context(Transition::RequestDetection.failure_message())?;
    let detected = controller.snapshot().and_then(|s| s.remaining_candidates);
    match detected {
        Some(n) => progress(format!("Detected {n} candidate(s)")),
        None => progress("Detection finished; candidate count unavailable".into()),
    }

    controller
        .confirm_figures()
        .await
        .context(Transition::ConfirmFigures.failure_message())?;

    let mut verdicts = Vec::new();
    while controller.step() == Step::AwaitingMatchDecision {
        let round = verdicts.len() + 1;
        if round > plan.max_rounds {
            bail!("no decision after {} candidates", plan.max_rounds);
        }
        if controller.snapshot().is_none() {
            controller.refresh().await.context(STATE_FETCH_FAILED)?;
        }
        let score = controller.snapshot().and_then(|s| s.similarity_score);
        let accepted = score.is_some_and(|s| percentage(s) > threshold);
        let display = score.map(format_score);
        progress(format!(
            "Candidate {round}: {} ({}) -> {}",
            display.as_deref().unwrap_or("no score"),
            score.map(tier).unwrap_or(ScoreTier::Default).label(),
            if accepted { "accept" } else { "reject" }
        ));
        verdicts.push(CandidateVerdict {
            round,
            score,
            display,
            tier: score.map(tier),
            accepted,
        });

        if accepted {
            controller
                .accept_match()
                .await
                .context(Transition::AcceptMatch.failure_message())?;
        } else {
            controller
                .reject_match()
                .await
                .context(Transition::RejectMatch.failure_message())?;
        }
    }

    let result = match controller.step() {
        Step::NoMatchFound => None,
        Step::AwaitingProcessChoice => {
            progress(format!("Applying {}…", plan.action.as_str()));
            controller
                .apply_transform(plan.action)
                .await
                .context(Transition::ApplyTransform(plan.action).failure_message())?;
            Some(controller.fetch_result().await.context("result fetch failed")?)
        }
        other => bail!("unexpected step after matching: {other}"),
    };

    info!(
        rounds = verdicts.len(),
        step = ?controller.step(),
        "autopilot finished"
    );
    Ok(AutopilotReport {
        detected,
        verdicts,
        final_step: controller.step(),
        result,
    })
}

//! Workflow steps and the transition table between them.
//!
//! Everything here is pure: the controller feeds in the transition that just
//! succeeded plus the snapshot fetched afterwards, and gets back the step to show.

use crate::model::{ImageSlot, ProcessAction, Snapshot};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    Idle,
    ImagesUploaded,
    AwaitingHumanDetectionConfirmation,
    AwaitingMatchDecision,
    AwaitingProcessChoice,
    ResultReady,
    NoMatchFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    Upload(ImageSlot),
    RequestDetection,
    ConfirmFigures,
    AcceptMatch,
    RejectMatch,
    ApplyTransform(ProcessAction),
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::ResultReady | Step::NoMatchFound)
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Idle | Step::ImagesUploaded => "Upload Images",
            Step::AwaitingHumanDetectionConfirmation => "Detected Human Figures",
            Step::AwaitingMatchDecision => "Match Results",
            Step::AwaitingProcessChoice => "How to Process the Image",
            Step::ResultReady => "Result",
            Step::NoMatchFound => "No Match",
        }
    }

    /// Position in the wizard breadcrumb (upload, detect, check, process, result).
    pub fn stage(self) -> usize {
        match self {
            Step::Idle | Step::ImagesUploaded => 0,
            Step::AwaitingHumanDetectionConfirmation => 1,
            Step::AwaitingMatchDecision | Step::NoMatchFound => 2,
            Step::AwaitingProcessChoice => 3,
            Step::ResultReady => 4,
        }
    }

    pub fn allows(self, transition: Transition) -> bool {
        match transition {
            Transition::Upload(_) => matches!(self, Step::Idle | Step::ImagesUploaded),
            Transition::RequestDetection => self == Step::ImagesUploaded,
            Transition::ConfirmFigures => self == Step::AwaitingHumanDetectionConfirmation,
            Transition::AcceptMatch | Transition::RejectMatch => {
                self == Step::AwaitingMatchDecision
            }
            Transition::ApplyTransform(_) => self == Step::AwaitingProcessChoice,
        }
    }

    /// Best guess at the current step from a snapshot alone, used when joining a
    /// session already in progress. Process choice and result are not visible in
    /// the snapshot and are never inferred.
    pub fn infer(snapshot: &Snapshot) -> Step {
        if snapshot.annotated_image.is_some() {
            if snapshot.similarity_score.is_some() {
                if snapshot.candidates_exhausted() {
                    Step::NoMatchFound
                } else {
                    Step::AwaitingMatchDecision
                }
            } else {
                Step::AwaitingHumanDetectionConfirmation
            }
        } else if snapshot.has_both_uploads() {
            Step::ImagesUploaded
        } else {
            Step::Idle
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Idle => "waiting for uploads",
            Step::ImagesUploaded => "images uploaded",
            Step::AwaitingHumanDetectionConfirmation => "awaiting detection confirmation",
            Step::AwaitingMatchDecision => "awaiting match decision",
            Step::AwaitingProcessChoice => "awaiting processing choice",
            Step::ResultReady => "result ready",
            Step::NoMatchFound => "no match found",
        };
        f.write_str(s)
    }
}

impl Transition {
    /// The single user-visible message shown when this transition fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            Transition::Upload(_) => "upload failed",
            Transition::RequestDetection => "detection failed",
            Transition::ConfirmFigures => "confirm failed",
            Transition::AcceptMatch => "match accept failed",
            Transition::RejectMatch => "reject failed",
            Transition::ApplyTransform(_) => "processing failed",
        }
    }

    /// Progress label shown while the request is in flight.
    pub fn busy_label(self) -> String {
        match self {
            Transition::Upload(slot) => format!("Uploading {}…", slot.label()),
            Transition::RequestDetection => "Detecting people…".into(),
            Transition::ConfirmFigures => "Confirming detected figures…".into(),
            Transition::AcceptMatch => "Accepting match…".into(),
            Transition::RejectMatch => "Checking next candidate…".into(),
            Transition::ApplyTransform(action) => format!("Applying {}…", action.as_str()),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Upload(slot) => write!(f, "upload {}", slot.label()),
            Transition::RequestDetection => f.write_str("request human detection"),
            Transition::ConfirmFigures => f.write_str("confirm detected figures"),
            Transition::AcceptMatch => f.write_str("accept candidate"),
            Transition::RejectMatch => f.write_str("reject candidate"),
            Transition::ApplyTransform(action) => write!(f, "apply {}", action.as_str()),
        }
    }
}

/// Step reached once `transition` has succeeded.
///
/// `snapshot` is the state re-fetched right after the transition, `None` when
/// that fetch failed. `both_uploaded` reports whether both upload receipts are held.
pub fn next_step(transition: Transition, snapshot: Option<&Snapshot>, both_uploaded: bool) -> Step {
    let exhausted = snapshot.is_some_and(Snapshot::candidates_exhausted);
    match transition {
        Transition::Upload(_) => {
            if both_uploaded || snapshot.is_some_and(Snapshot::has_both_uploads) {
                Step::ImagesUploaded
            } else {
                Step::Idle
            }
        }
        Transition::RequestDetection => Step::AwaitingHumanDetectionConfirmation,
        Transition::ConfirmFigures | Transition::RejectMatch => {
            if exhausted {
                Step::NoMatchFound
            } else {
                Step::AwaitingMatchDecision
            }
        }
        Transition::AcceptMatch => Step::AwaitingProcessChoice,
        Transition::ApplyTransform(_) => Step::ResultReady,
    }
}

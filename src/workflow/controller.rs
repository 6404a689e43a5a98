//! Workflow controller.
//!
//! The server owns the authoritative state. The controller only remembers which
//! step is shown, re-fetches the snapshot after each successful transition and
//! derives the next step from it. Failed transitions never move the step.

use super::machine::{next_step, Step, Transition};
use crate::backend::Backend;
use crate::error::WorkflowError;
use crate::model::{ImageSlot, ProcessAction, Snapshot, UploadReceipt};
use bytes::Bytes;
use tracing::{debug, info, warn};

/// User-visible description of the last failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    /// `None` when the failure was a snapshot fetch rather than a transition.
    pub transition: Option<Transition>,
    pub message: String,
    pub detail: String,
}

pub const STATE_FETCH_FAILED: &str = "failed to fetch state";

pub struct WorkflowController<B> {
    backend: B,
    step: Step,
    snapshot: Option<Snapshot>,
    scene_receipt: Option<UploadReceipt>,
    person_receipt: Option<UploadReceipt>,
    revision: u64,
    last_failure: Option<FailureNotice>,
}

impl<B: Backend> WorkflowController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            step: Step::Idle,
            snapshot: None,
            scene_receipt: None,
            person_receipt: None,
            revision: 0,
            last_failure: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Snapshot fetched on entry to the current step, `None` while unavailable.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Bumped on every applied transition, restart and resume.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_failure(&self) -> Option<&FailureNotice> {
        self.last_failure.as_ref()
    }

    pub fn receipt(&self, slot: ImageSlot) -> Option<&UploadReceipt> {
        match slot {
            ImageSlot::Scene => self.scene_receipt.as_ref(),
            ImageSlot::Person => self.person_receipt.as_ref(),
        }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Join whatever session the server currently holds, inferring the step
    /// from a fresh snapshot.
    pub async fn resume(&mut self) -> Result<Step, WorkflowError> {
        self.last_failure = None;
        self.refresh_snapshot().await?;
        if let Some(snapshot) = self.snapshot.as_ref() {
            self.step = Step::infer(snapshot);
        }
        self.revision += 1;
        info!(step = ?self.step, "resumed workflow");
        Ok(self.step)
    }

    /// Re-fetch the snapshot for the current step. On failure the cached
    /// snapshot is discarded so views fall back to their placeholders.
    pub async fn refresh(&mut self) -> Result<(), WorkflowError> {
        self.last_failure = None;
        self.refresh_snapshot().await
    }

    pub async fn upload(
        &mut self,
        slot: ImageSlot,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<Step, WorkflowError> {
        let transition = Transition::Upload(slot);
        self.begin(transition)?;
        match self.backend.upload(slot, file_name, bytes).await {
            Ok(receipt) => {
                info!(slot = ?slot, filename = %receipt.filename, "upload stored");
                match slot {
                    ImageSlot::Scene => self.scene_receipt = Some(receipt),
                    ImageSlot::Person => self.person_receipt = Some(receipt),
                }
                Ok(self.advance(transition).await)
            }
            Err(e) => Err(self.fail(transition, e)),
        }
    }

    pub async fn request_detection(&mut self) -> Result<Step, WorkflowError> {
        self.command(Transition::RequestDetection).await
    }

    pub async fn confirm_figures(&mut self) -> Result<Step, WorkflowError> {
        self.command(Transition::ConfirmFigures).await
    }

    pub async fn accept_match(&mut self) -> Result<Step, WorkflowError> {
        self.command(Transition::AcceptMatch).await
    }

    pub async fn reject_match(&mut self) -> Result<Step, WorkflowError> {
        self.command(Transition::RejectMatch).await
    }

    pub async fn apply_transform(&mut self, action: ProcessAction) -> Result<Step, WorkflowError> {
        self.command(Transition::ApplyTransform(action)).await
    }

    /// Download the processed image. Only available once the result is ready.
    pub async fn fetch_result(&self) -> Result<Bytes, WorkflowError> {
        if self.step != Step::ResultReady {
            return Err(WorkflowError::ResultUnavailable(self.step));
        }
        self.backend.fetch_result().await
    }

    /// Forget everything held client-side and start over from `Idle`.
    pub fn restart(&mut self) {
        info!(from = ?self.step, "restarting workflow");
        self.step = Step::Idle;
        self.snapshot = None;
        self.scene_receipt = None;
        self.person_receipt = None;
        self.last_failure = None;
        self.revision += 1;
    }

    async fn command(&mut self, transition: Transition) -> Result<Step, WorkflowError> {
        self.begin(transition)?;
        let outcome = match transition {
            Transition::RequestDetection => self.backend.request_detection().await,
            Transition::ConfirmFigures | Transition::RejectMatch => {
                self.backend.confirm_human().await
            }
            Transition::AcceptMatch => self.backend.found_person().await,
            Transition::ApplyTransform(action) => self.backend.modify(action).await,
            // Uploads carry a payload and go through `upload`.
            Transition::Upload(_) => {
                return Err(WorkflowError::InvalidTransition {
                    step: self.step,
                    transition,
                })
            }
        };
        match outcome {
            Ok(()) => Ok(self.advance(transition).await),
            Err(e) => Err(self.fail(transition, e)),
        }
    }

    fn begin(&mut self, transition: Transition) -> Result<(), WorkflowError> {
        if !self.step.allows(transition) {
            return Err(WorkflowError::InvalidTransition {
                step: self.step,
                transition,
            });
        }
        self.last_failure = None;
        debug!(%transition, step = ?self.step, "issuing transition");
        Ok(())
    }

    /// Apply a transition the server accepted: refresh, then derive the next step.
    async fn advance(&mut self, transition: Transition) -> Step {
        if let Err(e) = self.refresh_snapshot().await {
            warn!(%transition, error = %e, "transition applied but state refresh failed");
        }
        let both_uploaded = self.scene_receipt.is_some() && self.person_receipt.is_some();
        let next = next_step(transition, self.snapshot.as_ref(), both_uploaded);
        info!(%transition, from = ?self.step, to = ?next, "transition applied");
        self.step = next;
        self.revision += 1;
        next
    }

    fn fail(&mut self, transition: Transition, err: WorkflowError) -> WorkflowError {
        warn!(%transition, step = ?self.step, error = %err, "transition failed");
        self.last_failure = Some(FailureNotice {
            transition: Some(transition),
            message: transition.failure_message().to_string(),
            detail: err.to_string(),
        });
        err
    }

    async fn refresh_snapshot(&mut self) -> Result<(), WorkflowError> {
        // Replace wholesale; a failed fetch leaves nothing stale behind.
        self.snapshot = None;
        match self.backend.fetch_snapshot().await {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                Ok(())
            }
            Err(e) => {
                self.last_failure = Some(FailureNotice {
                    transition: None,
                    message: STATE_FETCH_FAILED.to_string(),
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

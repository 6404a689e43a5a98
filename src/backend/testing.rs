//! In-memory backend used by unit tests.

use super::Backend;
use crate::error::WorkflowError;
use crate::model::{ImageBlob, ImageSlot, ProcessAction, Snapshot, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mimics the server's candidate loop: detection finds `scores.len()` figures,
/// the first `confirm_human` scores the first candidate, and every further call
/// moves to the next one and decrements `any_more_faces`.
#[derive(Default)]
pub(crate) struct FakeBackend {
    inner: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    snapshot: Snapshot,
    scores: VecDeque<f64>,
    confirmed: bool,
    fail: VecDeque<&'static str>,
    calls: Vec<&'static str>,
    result: Option<Bytes>,
    applied: Option<ProcessAction>,
    snapshot_down: bool,
}

impl FakeBackend {
    pub(crate) fn with_candidates(scores: &[f64]) -> Self {
        let fake = Self::default();
        fake.inner.lock().unwrap().scores = scores.iter().copied().collect();
        fake
    }

    /// Make the next call to `op` answer with a 500.
    pub(crate) fn fail_next(&self, op: &'static str) {
        self.inner.lock().unwrap().fail.push_back(op);
    }

    pub(crate) fn set_snapshot_down(&self, down: bool) {
        self.inner.lock().unwrap().snapshot_down = down;
    }

    pub(crate) fn set_snapshot(&self, snapshot: Snapshot) {
        self.inner.lock().unwrap().snapshot = snapshot;
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn applied(&self) -> Option<ProcessAction> {
        self.inner.lock().unwrap().applied
    }

    fn enter(
        &self,
        op: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, FakeState>, WorkflowError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(op);
        if state.fail.front() == Some(&op) {
            state.fail.pop_front();
            return Err(WorkflowError::ServerRejected {
                status: 500,
                body: format!("{op} exploded"),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(
        &self,
        slot: ImageSlot,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<UploadReceipt, WorkflowError> {
        let mut state = self.enter("upload")?;
        let blob = Some(ImageBlob::from(bytes));
        match slot {
            ImageSlot::Scene => {
                state.snapshot.main_image = blob;
                state.snapshot.main_filename = Some(file_name.to_string());
            }
            ImageSlot::Person => {
                state.snapshot.person_image = blob;
                state.snapshot.person_filename = Some(file_name.to_string());
            }
        }
        Ok(UploadReceipt {
            filename: file_name.to_string(),
        })
    }

    async fn request_detection(&self) -> Result<(), WorkflowError> {
        let mut state = self.enter("human_detection")?;
        let found = state.scores.len() as u64;
        state.snapshot.annotated_image = Some(ImageBlob::from(vec![0xff, 0xd8, 0xff, 0xd9]));
        state.snapshot.remaining_candidates = Some(found);
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, WorkflowError> {
        let state = self.enter("get_state")?;
        if state.snapshot_down {
            return Err(WorkflowError::ServerRejected {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(state.snapshot.clone())
    }

    async fn confirm_human(&self) -> Result<(), WorkflowError> {
        let mut state = self.enter("confirm_human")?;
        if state.confirmed {
            state.scores.pop_front();
            let left = state.snapshot.remaining_candidates.unwrap_or(0).saturating_sub(1);
            state.snapshot.remaining_candidates = Some(left);
        }
        state.confirmed = true;
        if let Some(score) = state.scores.front().copied() {
            state.snapshot.similarity_score = Some(score);
        }
        Ok(())
    }

    async fn found_person(&self) -> Result<(), WorkflowError> {
        let _state = self.enter("found_person")?;
        Ok(())
    }

    async fn modify(&self, action: ProcessAction) -> Result<(), WorkflowError> {
        let mut state = self.enter("modify")?;
        state.applied = Some(action);
        state.result = Some(Bytes::from_static(b"processed-jpeg"));
        Ok(())
    }

    async fn fetch_result(&self) -> Result<Bytes, WorkflowError> {
        let state = self.enter("result")?;
        state.result.clone().ok_or(WorkflowError::ServerRejected {
            status: 404,
            body: "no result yet".into(),
        })
    }
}

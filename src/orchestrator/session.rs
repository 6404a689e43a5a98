//! Session driver.
//!
//! Owns the workflow controller, executes commands from presentation layers
//! one at a time and reports every outcome as a [`WorkflowEvent`].

use super::read_upload;
use crate::backend::Backend;
use crate::error::WorkflowError;
use crate::model::{ImageSlot, ProcessAction, WorkflowEvent};
use crate::storage::ResultStore;
use crate::workflow::{Transition, WorkflowController};
use std::path::PathBuf;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Upload { slot: ImageSlot, path: PathBuf },
    RequestDetection,
    ConfirmFigures,
    AcceptMatch,
    RejectMatch,
    ApplyTransform(ProcessAction),
    SaveResult { output: Option<PathBuf> },
    Refresh,
    Restart,
    Quit,
}

impl SessionCommand {
    /// Whether replaying this command against a newer revision would repeat
    /// a side effect.
    fn is_guarded(&self) -> bool {
        !matches!(self, SessionCommand::Refresh | SessionCommand::Quit)
    }
}

/// A command stamped with the controller revision the sender last saw.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub revision: u64,
    pub command: SessionCommand,
}

impl Envelope {
    pub fn new(revision: u64, command: SessionCommand) -> Self {
        Self { revision, command }
    }
}

/// Run the session until `Quit` arrives or every sender is dropped.
pub async fn run_session<B: Backend>(
    mut controller: WorkflowController<B>,
    store: ResultStore,
    event_tx: UnboundedSender<WorkflowEvent>,
    mut cmd_rx: UnboundedReceiver<Envelope>,
) {
    let _ = event_tx.send(WorkflowEvent::Busy {
        action: "Connecting…".into(),
    });
    let resumed = controller.resume().await;
    emit_step(&controller, &event_tx);
    match resumed {
        Ok(step) => {
            let _ = event_tx.send(WorkflowEvent::Info(format!(
                "Joined session: {}",
                step.title()
            )));
        }
        Err(e) => {
            error!(error = %e, "could not load workflow state");
            emit_failure(&controller, &event_tx, &e);
        }
    }

    while let Some(Envelope { revision, command }) = cmd_rx.recv().await {
        if matches!(command, SessionCommand::Quit) {
            break;
        }
        if command.is_guarded() && revision != controller.revision() {
            debug!(
                revision,
                current = controller.revision(),
                ?command,
                "dropping stale command"
            );
            let _ = event_tx.send(WorkflowEvent::Dropped { revision });
            continue;
        }
        handle_command(&mut controller, &store, &event_tx, command).await;
    }

    info!("session closed");
}

async fn handle_command<B: Backend>(
    controller: &mut WorkflowController<B>,
    store: &ResultStore,
    event_tx: &UnboundedSender<WorkflowEvent>,
    command: SessionCommand,
) {
    let res = match command {
        SessionCommand::Upload { slot, path } => {
            let transition = Transition::Upload(slot);
            busy(event_tx, transition.busy_label());
            let (file_name, bytes) = match read_upload(&path).await {
                Ok(v) => v,
                Err(e) => {
                    let _ = event_tx.send(WorkflowEvent::Failed {
                        transition: Some(transition),
                        message: transition.failure_message().into(),
                        detail: format!("{e:#}"),
                    });
                    return;
                }
            };
            let res = controller.upload(slot, &file_name, bytes).await;
            if res.is_ok() {
                if let Some(receipt) = controller.receipt(slot) {
                    let _ = event_tx.send(WorkflowEvent::Uploaded {
                        slot,
                        receipt: receipt.clone(),
                    });
                }
            }
            res
        }
        SessionCommand::RequestDetection => {
            busy(event_tx, Transition::RequestDetection.busy_label());
            controller.request_detection().await
        }
        SessionCommand::ConfirmFigures => {
            busy(event_tx, Transition::ConfirmFigures.busy_label());
            controller.confirm_figures().await
        }
        SessionCommand::AcceptMatch => {
            busy(event_tx, Transition::AcceptMatch.busy_label());
            controller.accept_match().await
        }
        SessionCommand::RejectMatch => {
            busy(event_tx, Transition::RejectMatch.busy_label());
            controller.reject_match().await
        }
        SessionCommand::ApplyTransform(action) => {
            busy(event_tx, Transition::ApplyTransform(action).busy_label());
            controller.apply_transform(action).await
        }
        SessionCommand::SaveResult { output } => {
            busy(event_tx, "Fetching result…".into());
            save_result(controller, store, event_tx, output).await;
            return;
        }
        SessionCommand::Refresh => {
            busy(event_tx, "Refreshing…".into());
            let res = controller.refresh().await;
            // The cached snapshot is gone on failure; views need to know either way.
            emit_step(controller, event_tx);
            if let Err(e) = res {
                emit_failure(controller, event_tx, &e);
            }
            return;
        }
        SessionCommand::Restart => {
            controller.restart();
            emit_step(controller, event_tx);
            return;
        }
        SessionCommand::Quit => return,
    };

    match res {
        Ok(_) => {
            emit_step(controller, event_tx);
            // A transition can succeed while the follow-up state fetch fails.
            if let Some(notice) = controller.last_failure() {
                let _ = event_tx.send(WorkflowEvent::Failed {
                    transition: notice.transition,
                    message: notice.message.clone(),
                    detail: notice.detail.clone(),
                });
            }
        }
        Err(e) => emit_failure(controller, event_tx, &e),
    }
}

async fn save_result<B: Backend>(
    controller: &WorkflowController<B>,
    store: &ResultStore,
    event_tx: &UnboundedSender<WorkflowEvent>,
    output: Option<PathBuf>,
) {
    let bytes = match controller.fetch_result().await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "result fetch failed");
            let _ = event_tx.send(WorkflowEvent::Failed {
                transition: None,
                message: "result fetch failed".into(),
                detail: e.to_string(),
            });
            return;
        }
    };
    match store.save("result", &bytes, output.as_deref()) {
        Ok(path) => {
            info!(path = %path.display(), bytes = bytes.len(), "result saved");
            let _ = event_tx.send(WorkflowEvent::ResultSaved {
                path,
                bytes: bytes.len(),
            });
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "saving result failed");
            let _ = event_tx.send(WorkflowEvent::Failed {
                transition: None,
                message: "saving result failed".into(),
                detail: format!("{e:#}"),
            });
        }
    }
}

fn busy(event_tx: &UnboundedSender<WorkflowEvent>, action: String) {
    let _ = event_tx.send(WorkflowEvent::Busy { action });
}

fn emit_step<B: Backend>(
    controller: &WorkflowController<B>,
    event_tx: &UnboundedSender<WorkflowEvent>,
) {
    let _ = event_tx.send(WorkflowEvent::StepChanged {
        step: controller.step(),
        revision: controller.revision(),
        snapshot: controller.snapshot().cloned().map(Box::new),
    });
}

/// Report a failure once, preferring the controller's user-facing notice.
fn emit_failure<B: Backend>(
    controller: &WorkflowController<B>,
    event_tx: &UnboundedSender<WorkflowEvent>,
    err: &WorkflowError,
) {
    let event = match controller.last_failure() {
        Some(notice) => WorkflowEvent::Failed {
            transition: notice.transition,
            message: notice.message.clone(),
            detail: notice.detail.clone(),
        },
        None => WorkflowEvent::Failed {
            transition: None,
            message: err.to_string(),
            detail: String::new(),
        },
    };
    let _ = event_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::FakeBackend;
    use crate::workflow::{Step, STATE_FETCH_FAILED};
    use tokio::sync::mpsc;

    struct Harness {
        cmd_tx: mpsc::UnboundedSender<Envelope>,
        event_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
        handle: tokio::task::JoinHandle<()>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn start(fake: FakeBackend) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("scene.jpg"), b"scene-bytes").unwrap();
            std::fs::write(dir.path().join("person.jpg"), b"person-bytes").unwrap();
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let store = ResultStore::new(dir.path().join("results"));
            let handle = tokio::spawn(run_session(
                WorkflowController::new(fake),
                store,
                event_tx,
                cmd_rx,
            ));
            Self {
                cmd_tx,
                event_rx,
                handle,
                dir,
            }
        }

        fn send(&self, revision: u64, command: SessionCommand) {
            self.cmd_tx.send(Envelope::new(revision, command)).unwrap();
        }

        /// Next event that resolves a request, skipping progress noise.
        async fn completion(&mut self) -> WorkflowEvent {
            loop {
                let ev = self.event_rx.recv().await.expect("session ended early");
                if ev.completes_request() {
                    return ev;
                }
            }
        }

        async fn step(&mut self) -> (Step, u64, Option<u64>) {
            match self.completion().await {
                WorkflowEvent::StepChanged {
                    step,
                    revision,
                    snapshot,
                } => (step, revision, snapshot.and_then(|s| s.remaining_candidates)),
                other => panic!("expected step change, got {other:?}"),
            }
        }

        async fn upload_both(&mut self, rev: u64) -> u64 {
            let scene = self.dir.path().join("scene.jpg");
            let person = self.dir.path().join("person.jpg");
            self.send(rev, SessionCommand::Upload { slot: ImageSlot::Scene, path: scene });
            let (_, rev, _) = self.step().await;
            self.send(rev, SessionCommand::Upload { slot: ImageSlot::Person, path: person });
            let (step, rev, _) = self.step().await;
            assert_eq!(step, Step::ImagesUploaded);
            rev
        }

        async fn quit(self) {
            self.send(0, SessionCommand::Quit);
            self.handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn double_submitted_reject_applies_once() {
        let mut h = Harness::start(FakeBackend::with_candidates(&[0.3, 0.2, 0.1]));
        let (step, rev, _) = h.step().await;
        assert_eq!(step, Step::Idle);

        let rev = h.upload_both(rev).await;
        h.send(rev, SessionCommand::RequestDetection);
        let (_, rev, remaining) = h.step().await;
        assert_eq!(remaining, Some(3));
        h.send(rev, SessionCommand::ConfirmFigures);
        let (step, rev, _) = h.step().await;
        assert_eq!(step, Step::AwaitingMatchDecision);

        h.send(rev, SessionCommand::RejectMatch);
        h.send(rev, SessionCommand::RejectMatch);
        let (step, _, remaining) = h.step().await;
        assert_eq!(step, Step::AwaitingMatchDecision);
        assert_eq!(remaining, Some(2));
        assert!(matches!(
            h.completion().await,
            WorkflowEvent::Dropped { revision } if revision == rev
        ));

        h.send(0, SessionCommand::Refresh);
        let (_, _, remaining) = h.step().await;
        assert_eq!(remaining, Some(2));
        h.quit().await;
    }

    #[tokio::test]
    async fn walks_to_saved_result() {
        let mut h = Harness::start(FakeBackend::with_candidates(&[0.9]));
        let (_, rev, _) = h.step().await;
        let mut rev = h.upload_both(rev).await;

        for (command, expected) in [
            (SessionCommand::RequestDetection, Step::AwaitingHumanDetectionConfirmation),
            (SessionCommand::ConfirmFigures, Step::AwaitingMatchDecision),
            (SessionCommand::AcceptMatch, Step::AwaitingProcessChoice),
            (SessionCommand::ApplyTransform(ProcessAction::Blur), Step::ResultReady),
        ] {
            h.send(rev, command);
            let (step, next, _) = h.step().await;
            assert_eq!(step, expected);
            assert_eq!(next, rev + 1);
            rev = next;
        }

        h.send(rev, SessionCommand::SaveResult { output: None });
        match h.completion().await {
            WorkflowEvent::ResultSaved { path, bytes } => {
                assert_eq!(bytes, b"processed-jpeg".len());
                assert!(path.starts_with(h.dir.path().join("results")));
                assert_eq!(std::fs::read(path).unwrap(), b"processed-jpeg");
            }
            other => panic!("expected saved result, got {other:?}"),
        }

        // Refresh is never stale and does not move the revision.
        h.send(0, SessionCommand::Refresh);
        let (step, same, _) = h.step().await;
        assert_eq!(step, Step::ResultReady);
        assert_eq!(same, rev);

        h.send(rev, SessionCommand::Restart);
        let (step, next, remaining) = h.step().await;
        assert_eq!(step, Step::Idle);
        assert_eq!(next, rev + 1);
        assert_eq!(remaining, None);
        h.quit().await;
    }

    #[tokio::test]
    async fn failed_transition_reports_one_message() {
        let fake = FakeBackend::with_candidates(&[0.5]);
        fake.fail_next("human_detection");
        let mut h = Harness::start(fake);
        let (_, rev, _) = h.step().await;
        let rev = h.upload_both(rev).await;

        h.send(rev, SessionCommand::RequestDetection);
        match h.completion().await {
            WorkflowEvent::Failed {
                transition,
                message,
                ..
            } => {
                assert_eq!(transition, Some(Transition::RequestDetection));
                assert_eq!(message, "detection failed");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // Same revision still valid: nothing moved.
        h.send(rev, SessionCommand::RequestDetection);
        let (step, _, _) = h.step().await;
        assert_eq!(step, Step::AwaitingHumanDetectionConfirmation);
        h.quit().await;
    }

    #[tokio::test]
    async fn missing_upload_file_is_an_upload_failure() {
        let mut h = Harness::start(FakeBackend::with_candidates(&[]));
        let (_, rev, _) = h.step().await;
        let missing = h.dir.path().join("nope.jpg");
        h.send(rev, SessionCommand::Upload { slot: ImageSlot::Scene, path: missing });
        match h.completion().await {
            WorkflowEvent::Failed { message, .. } => assert_eq!(message, "upload failed"),
            other => panic!("expected failure, got {other:?}"),
        }
        h.quit().await;
    }

    #[tokio::test]
    async fn unreachable_state_shows_placeholder() {
        let fake = FakeBackend::with_candidates(&[]);
        fake.set_snapshot_down(true);
        let mut h = Harness::start(fake);
        match h.completion().await {
            WorkflowEvent::StepChanged { step, snapshot, .. } => {
                assert_eq!(step, Step::Idle);
                assert!(snapshot.is_none());
            }
            other => panic!("expected step change, got {other:?}"),
        }
        match h.completion().await {
            WorkflowEvent::Failed { message, .. } => assert_eq!(message, STATE_FETCH_FAILED),
            other => panic!("expected failure, got {other:?}"),
        }
        h.quit().await;
    }
}

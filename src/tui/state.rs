use super::preview::Preview;
use crate::model::{ImageSlot, ProcessAction, Snapshot, UploadReceipt, WorkflowEvent};
use crate::orchestrator::SessionCommand;
use crate::workflow::Step;
use crossterm::event::{KeyCode, KeyModifiers};
use std::path::PathBuf;

/// Path being typed for one of the uploads.
pub struct PathInput {
    pub slot: ImageSlot,
    pub buffer: String,
}

/// What the render loop should do after a key press.
pub enum KeyOutcome {
    Nothing,
    Send(SessionCommand),
    ExportAnnotated,
    Quit,
}

pub struct UiState {
    pub tab: usize,
    pub base_url: String,
    pub step: Step,
    pub revision: u64,
    pub snapshot: Option<Snapshot>,
    /// Label of the request in flight. Action keys are ignored while set.
    pub busy: Option<String>,
    pub info: String,
    pub error: Option<String>,
    pub input: Option<PathInput>,
    pub scene_receipt: Option<UploadReceipt>,
    pub person_receipt: Option<UploadReceipt>,
    pub last_saved: Option<PathBuf>,

    pub scene_preview: Preview,
    pub person_preview: Preview,
    pub annotated_preview: Preview,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            base_url: String::new(),
            step: Step::Idle,
            revision: 0,
            snapshot: None,
            busy: None,
            info: String::new(),
            error: None,
            input: None,
            scene_receipt: None,
            person_receipt: None,
            last_saved: None,
            scene_preview: Preview::Missing,
            person_preview: Preview::Missing,
            annotated_preview: Preview::Missing,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: WorkflowEvent) {
        match ev {
            WorkflowEvent::Busy { action } => {
                self.busy = Some(action);
            }
            WorkflowEvent::StepChanged {
                step,
                revision,
                snapshot,
            } => {
                self.busy = None;
                self.error = None;
                if step != self.step {
                    self.info = format!("Step: {}", step.title());
                }
                self.step = step;
                self.revision = revision;
                self.set_snapshot(snapshot.map(|s| *s));
            }
            WorkflowEvent::Uploaded { slot, receipt } => {
                self.info = format!("Uploaded {}: {}", slot.label(), receipt.filename);
                match slot {
                    ImageSlot::Scene => self.scene_receipt = Some(receipt),
                    ImageSlot::Person => self.person_receipt = Some(receipt),
                }
            }
            WorkflowEvent::Failed { message, detail, .. } => {
                tracing::debug!(%message, %detail, "request failed");
                self.busy = None;
                self.error = Some(message);
            }
            WorkflowEvent::ResultSaved { path, bytes } => {
                self.busy = None;
                self.info = format!("Saved: {} ({bytes} bytes)", path.display());
                self.last_saved = Some(path);
            }
            WorkflowEvent::Dropped { .. } => {
                self.busy = None;
                self.info = "Ignored a request for an outdated step".into();
            }
            WorkflowEvent::Info(msg) => {
                self.info = msg;
            }
        }
    }

    fn set_snapshot(&mut self, snapshot: Option<Snapshot>) {
        let s = snapshot.as_ref();
        self.scene_preview = Preview::from_blob(s.and_then(|s| s.main_image.as_ref()));
        self.person_preview = Preview::from_blob(s.and_then(|s| s.person_image.as_ref()));
        self.annotated_preview = Preview::from_blob(s.and_then(|s| s.annotated_image.as_ref()));
        self.snapshot = snapshot;
    }

    /// File name shown for an upload slot: server-reported first, then our receipt.
    pub fn uploaded_name(&self, slot: ImageSlot) -> Option<&str> {
        let (from_server, receipt) = match slot {
            ImageSlot::Scene => (
                self.snapshot.as_ref().and_then(|s| s.main_filename.as_deref()),
                self.scene_receipt.as_ref(),
            ),
            ImageSlot::Person => (
                self.snapshot.as_ref().and_then(|s| s.person_filename.as_deref()),
                self.person_receipt.as_ref(),
            ),
        };
        from_server.or(receipt.map(|r| r.filename.as_str()))
    }

    pub fn handle_key(&mut self, modifiers: KeyModifiers, code: KeyCode) -> KeyOutcome {
        if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }
        if self.input.is_some() {
            return self.handle_input_key(code);
        }

        match code {
            KeyCode::Char('q') => return KeyOutcome::Quit,
            KeyCode::Tab => {
                self.tab = (self.tab + 1) % 2;
                return KeyOutcome::Nothing;
            }
            KeyCode::Char('?') => {
                self.tab = 1;
                return KeyOutcome::Nothing;
            }
            _ => {}
        }
        if self.tab != 0 {
            return KeyOutcome::Nothing;
        }
        if self.busy.is_some() {
            if matches!(code, KeyCode::Char(_) | KeyCode::Enter) {
                self.info = "Working…, please wait".into();
            }
            return KeyOutcome::Nothing;
        }

        let KeyCode::Char(c) = code else {
            return KeyOutcome::Nothing;
        };
        if c == 'r' {
            return self.issue("Refreshing…", SessionCommand::Refresh);
        }
        match (self.step, c) {
            (Step::Idle | Step::ImagesUploaded, 's') => self.start_input(ImageSlot::Scene),
            (Step::Idle | Step::ImagesUploaded, 'p') => self.start_input(ImageSlot::Person),
            (Step::ImagesUploaded, 'd') => {
                self.issue("Detecting human figures…", SessionCommand::RequestDetection)
            }
            (Step::Idle, 'd') => {
                self.info = "Upload both images first".into();
                KeyOutcome::Nothing
            }
            (Step::AwaitingHumanDetectionConfirmation, 'c') => {
                self.issue("Checking candidates…", SessionCommand::ConfirmFigures)
            }
            (
                Step::AwaitingHumanDetectionConfirmation
                | Step::AwaitingMatchDecision
                | Step::AwaitingProcessChoice,
                'e',
            ) => KeyOutcome::ExportAnnotated,
            (Step::AwaitingMatchDecision, 'a') => {
                self.issue("Accepting match…", SessionCommand::AcceptMatch)
            }
            (Step::AwaitingMatchDecision, 'x') => {
                self.issue("Checking next candidate…", SessionCommand::RejectMatch)
            }
            (Step::AwaitingProcessChoice, 'b') => self.issue(
                "Blurring…",
                SessionCommand::ApplyTransform(ProcessAction::Blur),
            ),
            (Step::AwaitingProcessChoice, 'k') => self.issue(
                "Applying sticker…",
                SessionCommand::ApplyTransform(ProcessAction::Sticker),
            ),
            (Step::ResultReady, 's') => {
                self.issue("Fetching result…", SessionCommand::SaveResult { output: None })
            }
            (_, 'n') => {
                self.scene_receipt = None;
                self.person_receipt = None;
                self.last_saved = None;
                self.issue("Starting over…", SessionCommand::Restart)
            }
            _ => KeyOutcome::Nothing,
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) -> KeyOutcome {
        let Some(input) = self.input.as_mut() else {
            return KeyOutcome::Nothing;
        };
        match code {
            KeyCode::Esc => {
                self.input = None;
                KeyOutcome::Nothing
            }
            KeyCode::Backspace => {
                input.buffer.pop();
                KeyOutcome::Nothing
            }
            KeyCode::Char(c) => {
                input.buffer.push(c);
                KeyOutcome::Nothing
            }
            KeyCode::Enter => {
                let path = input.buffer.trim().to_string();
                let slot = input.slot;
                if path.is_empty() {
                    self.info = format!("Enter a path for the {}", slot.label());
                    return KeyOutcome::Nothing;
                }
                self.input = None;
                self.issue(
                    "Uploading…",
                    SessionCommand::Upload {
                        slot,
                        path: PathBuf::from(path),
                    },
                )
            }
            _ => KeyOutcome::Nothing,
        }
    }

    fn start_input(&mut self, slot: ImageSlot) -> KeyOutcome {
        self.input = Some(PathInput {
            slot,
            buffer: String::new(),
        });
        self.error = None;
        KeyOutcome::Nothing
    }

    /// Mark the request in flight before it is sent so a second key press
    /// cannot submit it again.
    fn issue(&mut self, label: &str, command: SessionCommand) -> KeyOutcome {
        self.busy = Some(label.to_string());
        self.error = None;
        KeyOutcome::Send(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(state: &mut UiState, c: char) -> KeyOutcome {
        state.handle_key(KeyModifiers::NONE, KeyCode::Char(c))
    }

    fn at(step: Step) -> UiState {
        let mut state = UiState::default();
        state.apply_event(WorkflowEvent::StepChanged {
            step,
            revision: 3,
            snapshot: None,
        });
        state
    }

    #[test]
    fn typing_a_path_uploads_it() {
        let mut state = at(Step::Idle);
        key(&mut state, 's');
        for c in "/tmp/a.jpg".chars() {
            key(&mut state, c);
        }
        match state.handle_key(KeyModifiers::NONE, KeyCode::Enter) {
            KeyOutcome::Send(SessionCommand::Upload { slot, path }) => {
                assert_eq!(slot, ImageSlot::Scene);
                assert_eq!(path, PathBuf::from("/tmp/a.jpg"));
            }
            _ => panic!("expected upload"),
        }
        assert!(state.input.is_none());
        assert!(state.busy.is_some());
    }

    #[test]
    fn busy_blocks_a_second_submit() {
        let mut state = at(Step::AwaitingMatchDecision);
        assert!(matches!(
            key(&mut state, 'x'),
            KeyOutcome::Send(SessionCommand::RejectMatch)
        ));
        assert!(matches!(key(&mut state, 'x'), KeyOutcome::Nothing));

        state.apply_event(WorkflowEvent::Failed {
            transition: None,
            message: "reject failed".into(),
            detail: "500".into(),
        });
        assert!(state.busy.is_none());
        assert_eq!(state.error.as_deref(), Some("reject failed"));
        assert!(matches!(
            key(&mut state, 'x'),
            KeyOutcome::Send(SessionCommand::RejectMatch)
        ));
        assert!(state.error.is_none());
    }

    #[test]
    fn keys_only_act_in_their_step() {
        let mut state = at(Step::AwaitingHumanDetectionConfirmation);
        assert!(matches!(key(&mut state, 'a'), KeyOutcome::Nothing));
        assert!(matches!(key(&mut state, 'b'), KeyOutcome::Nothing));

        let mut state = at(Step::NoMatchFound);
        assert!(matches!(key(&mut state, 's'), KeyOutcome::Nothing));
        assert!(matches!(
            key(&mut state, 'n'),
            KeyOutcome::Send(SessionCommand::Restart)
        ));

        let mut state = at(Step::Idle);
        assert!(matches!(key(&mut state, 'd'), KeyOutcome::Nothing));
        assert_eq!(state.info, "Upload both images first");
    }

    #[test]
    fn restart_works_from_every_step() {
        for step in [
            Step::Idle,
            Step::ImagesUploaded,
            Step::AwaitingHumanDetectionConfirmation,
            Step::AwaitingMatchDecision,
            Step::AwaitingProcessChoice,
            Step::ResultReady,
            Step::NoMatchFound,
        ] {
            let mut state = at(step);
            assert!(
                matches!(key(&mut state, 'n'), KeyOutcome::Send(SessionCommand::Restart)),
                "restart refused in {step:?}"
            );
            assert!(state.busy.is_some());
        }
    }

    #[test]
    fn quit_works_everywhere() {
        let mut state = at(Step::Idle);
        key(&mut state, 'p');
        assert!(matches!(
            state.handle_key(KeyModifiers::CONTROL, KeyCode::Char('c')),
            KeyOutcome::Quit
        ));
        // 'q' is text while typing a path.
        assert!(matches!(key(&mut state, 'q'), KeyOutcome::Nothing));
        assert_eq!(state.input.as_ref().unwrap().buffer, "q");
    }

    #[test]
    fn step_change_clears_busy_and_error() {
        let mut state = at(Step::ImagesUploaded);
        state.error = Some("detection failed".into());
        state.busy = Some("Detecting…".into());
        state.apply_event(WorkflowEvent::StepChanged {
            step: Step::AwaitingHumanDetectionConfirmation,
            revision: 4,
            snapshot: Some(Box::new(Snapshot::default())),
        });
        assert!(state.busy.is_none());
        assert!(state.error.is_none());
        assert_eq!(state.revision, 4);
        assert!(matches!(state.annotated_preview, Preview::Missing));
    }
}

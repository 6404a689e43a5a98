use crate::workflow::{Step, Transition};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5123".into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("bluree-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Which of the two uploads an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSlot {
    Scene,
    Person,
}

impl ImageSlot {
    /// Multipart field name the upload endpoint keys on.
    pub fn field_name(self) -> &'static str {
        match self {
            ImageSlot::Scene => "main_pic",
            ImageSlot::Person => "person_pic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageSlot::Scene => "scene image",
            ImageSlot::Person => "person image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    Blur,
    Sticker,
}

impl ProcessAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessAction::Blur => "blur",
            ProcessAction::Sticker => "sticker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
}

/// Opaque image payload. Never inspected by the workflow, only shown or forwarded.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob(Bytes);

impl ImageBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ImageBlob {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<Bytes> for ImageBlob {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl std::fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageBlob({} bytes)", self.0.len())
    }
}

/// Server-held workflow state as last fetched. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub main_image: Option<ImageBlob>,
    pub person_image: Option<ImageBlob>,
    pub annotated_image: Option<ImageBlob>,
    pub similarity_score: Option<f64>,
    pub remaining_candidates: Option<u64>,
    pub main_filename: Option<String>,
    pub person_filename: Option<String>,
}

impl Snapshot {
    pub fn has_both_uploads(&self) -> bool {
        self.main_image.is_some() && self.person_image.is_some()
    }

    /// True only when the server explicitly reports zero remaining candidates.
    pub fn candidates_exhausted(&self) -> bool {
        self.remaining_candidates == Some(0)
    }
}

/// Events emitted by the session driver and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A request was issued; the triggering control stays disabled until a
    /// completion event arrives.
    Busy { action: String },
    StepChanged {
        step: Step,
        revision: u64,
        // Boxed to keep the event small; snapshots carry whole images.
        snapshot: Option<Box<Snapshot>>,
    },
    Uploaded {
        slot: ImageSlot,
        receipt: UploadReceipt,
    },
    Failed {
        transition: Option<Transition>,
        message: String,
        detail: String,
    },
    ResultSaved {
        path: PathBuf,
        bytes: usize,
    },
    /// A command was discarded because it was issued against an older revision.
    Dropped { revision: u64 },
    Info(String),
}

impl WorkflowEvent {
    /// Whether this event resolves an in-flight request.
    pub fn completes_request(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::StepChanged { .. }
                | WorkflowEvent::Failed { .. }
                | WorkflowEvent::ResultSaved { .. }
                | WorkflowEvent::Dropped { .. }
        )
    }
}

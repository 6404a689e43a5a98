//! Application-level orchestration.
//!
//! The session driver serves the interactive UI; the autopilot drives a whole
//! workflow unattended for the `run` subcommand. Both sit on top of
//! [`WorkflowController`](crate::workflow::WorkflowController) so that UI and
//! CLI layers never talk to the backend directly.

mod autopilot;
mod session;

pub use autopilot::{drive, AutopilotPlan, AutopilotReport, CandidateVerdict, UploadSource};
pub use session::{run_session, Envelope, SessionCommand};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use std::path::Path;

/// Read an image from disk for upload, returning the file name sent to the
/// server alongside its contents.
pub async fn read_upload(path: &Path) -> Result<(String, Bytes)> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    Ok((file_name, Bytes::from(bytes)))
}

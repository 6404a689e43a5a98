mod client;
mod snapshot;
#[cfg(test)]
pub(crate) mod testing;

pub use client::BackendClient;
pub use snapshot::decode_snapshot;

use crate::error::WorkflowError;
use crate::model::{ImageSlot, ProcessAction, Snapshot, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;

/// The remote service that performs detection, matching and image edits.
///
/// Command methods only report success or failure; the workflow learns what
/// changed by fetching a fresh snapshot afterwards.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn upload(
        &self,
        slot: ImageSlot,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<UploadReceipt, WorkflowError>;

    async fn request_detection(&self) -> Result<(), WorkflowError>;

    async fn fetch_snapshot(&self) -> Result<Snapshot, WorkflowError>;

    /// Advance the server's candidate pointer. Used both to confirm the
    /// detected figures and to reject the current candidate.
    async fn confirm_human(&self) -> Result<(), WorkflowError>;

    async fn found_person(&self) -> Result<(), WorkflowError>;

    async fn modify(&self, action: ProcessAction) -> Result<(), WorkflowError>;

    /// Raw bytes of the processed image.
    async fn fetch_result(&self) -> Result<Bytes, WorkflowError>;
}

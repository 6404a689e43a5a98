use super::state::UiState;
use crate::storage::ResultStore;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Write the annotated detection image from the current snapshot.
pub fn save_annotated(state: &UiState, store: &ResultStore) -> Result<PathBuf> {
    let blob = state
        .snapshot
        .as_ref()
        .and_then(|s| s.annotated_image.as_ref())
        .context("no annotated image to save")?;
    store.save("annotated", blob.as_bytes(), None)
}

/// Save the annotated image and report the outcome in the status line.
pub fn save_and_show_path(state: &mut UiState, store: &ResultStore) {
    match save_annotated(state, store) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "annotated image saved");
            state.info = format!("Saved: {}", path.display());
        }
        Err(e) => {
            state.info = format!("Save failed: {e:#}");
        }
    }
}

//! Lenient decoding of the `/get_state` payload.
//!
//! Any field that is missing, null, mistyped or undecodable is treated as
//! absent. Only a body that is not a JSON object fails the fetch.

use crate::error::WorkflowError;
use crate::model::{ImageBlob, Snapshot};
use base64::Engine;
use serde_json::{Map, Value};
use tracing::warn;

const MAIN_IMAGE: &str = "main_pic_bytes";
const PERSON_IMAGE: &str = "person_pic_bytes";
const ANNOTATED_IMAGE: &str = "body_with_box_bytes";
const SIMILARITY_SCORE: &str = "similarity_score";
const REMAINING_CANDIDATES: &str = "any_more_faces";
const MAIN_FILENAME: &str = "main_pic_filename";
const PERSON_FILENAME: &str = "person_pic_filename";

pub fn decode_snapshot(body: &[u8]) -> Result<Snapshot, WorkflowError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| WorkflowError::Decode(format!("state is not JSON: {e}")))?;
    let Value::Object(map) = value else {
        return Err(WorkflowError::Decode("state is not a JSON object".into()));
    };

    Ok(Snapshot {
        main_image: image_field(&map, MAIN_IMAGE),
        person_image: image_field(&map, PERSON_IMAGE),
        annotated_image: image_field(&map, ANNOTATED_IMAGE),
        similarity_score: score_field(&map),
        remaining_candidates: count_field(&map),
        main_filename: text_field(&map, MAIN_FILENAME),
        person_filename: text_field(&map, PERSON_FILENAME),
    })
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn image_field(map: &Map<String, Value>, key: &str) -> Option<ImageBlob> {
    let raw = present(map, key)?;
    let Some(encoded) = raw.as_str() else {
        warn!(field = key, "expected base64 string, ignoring field");
        return None;
    };
    if encoded.is_empty() {
        return None;
    }
    match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => Some(ImageBlob::from(bytes)),
        Err(e) => {
            warn!(field = key, error = %e, "invalid base64, ignoring field");
            None
        }
    }
}

fn score_field(map: &Map<String, Value>) -> Option<f64> {
    let raw = present(map, SIMILARITY_SCORE)?;
    let score = raw.as_f64();
    if score.is_none() {
        warn!(field = SIMILARITY_SCORE, "expected a number, ignoring field");
    }
    score
}

fn count_field(map: &Map<String, Value>) -> Option<u64> {
    let raw = present(map, REMAINING_CANDIDATES)?;
    let count = raw.as_u64();
    if count.is_none() {
        warn!(
            field = REMAINING_CANDIDATES,
            value = %raw,
            "expected a non-negative integer, ignoring field"
        );
    }
    count
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    present(map, key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

use super::{decode_snapshot, Backend};
use crate::error::WorkflowError;
use crate::model::{ClientConfig, ImageSlot, ProcessAction, Snapshot, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Response, Url};
use serde_json::json;
use tracing::debug;

const UPLOAD_PATH: &str = "upload";
const DETECTION_PATH: &str = "human_detection";
const STATE_PATH: &str = "get_state";
const CONFIRM_HUMAN_PATH: &str = "confirm_human";
const FOUND_PERSON_PATH: &str = "found_person";
const MODIFY_PATH: &str = "modify";
const RESULT_PATH: &str = "result";

/// Longest error body kept from a rejected request.
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the Bluree backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, WorkflowError> {
        // Url::join drops the last path segment unless the base ends with '/'.
        let mut base = cfg.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| WorkflowError::Config(format!("invalid base URL {:?}: {e}", cfg.base_url)))?;

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.connect_timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, WorkflowError> {
        self.base_url
            .join(path)
            .map_err(|e| WorkflowError::Config(format!("cannot build URL for {path}: {e}")))
    }

    /// POST an empty JSON object, the body every step command carries.
    async fn post_command(&self, path: &str) -> Result<(), WorkflowError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST command");
        let resp = self.http.post(url).json(&json!({})).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

/// Map a non-2xx response to `ServerRejected`, keeping a short excerpt of the body.
async fn ensure_success(resp: Response) -> Result<Response, WorkflowError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let mut body = body.trim().to_string();
    if body.chars().count() > MAX_ERROR_BODY {
        body = body.chars().take(MAX_ERROR_BODY).collect::<String>() + "…";
    }
    Err(WorkflowError::ServerRejected {
        status: status.as_u16(),
        body,
    })
}

/// Content type for an upload, guessed from the file extension.
fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn upload(
        &self,
        slot: ImageSlot,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<UploadReceipt, WorkflowError> {
        let url = self.endpoint(UPLOAD_PATH)?;
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = multipart::Form::new().part(slot.field_name(), part);

        debug!(%url, field = slot.field_name(), file_name, size, "POST upload");
        let resp = self.http.post(url).multipart(form).send().await?;
        let body = ensure_success(resp).await?.bytes().await?;
        serde_json::from_slice::<UploadReceipt>(&body)
            .map_err(|e| WorkflowError::Decode(format!("upload response: {e}")))
    }

    async fn request_detection(&self) -> Result<(), WorkflowError> {
        let url = self.endpoint(DETECTION_PATH)?;
        debug!(%url, "POST detection");
        let resp = self.http.post(url).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, WorkflowError> {
        let url = self.endpoint(STATE_PATH)?;
        debug!(%url, "GET state");
        let resp = self.http.get(url).send().await?;
        let body = ensure_success(resp).await?.bytes().await?;
        decode_snapshot(&body)
    }

    async fn confirm_human(&self) -> Result<(), WorkflowError> {
        self.post_command(CONFIRM_HUMAN_PATH).await
    }

    async fn found_person(&self) -> Result<(), WorkflowError> {
        self.post_command(FOUND_PERSON_PATH).await
    }

    async fn modify(&self, action: ProcessAction) -> Result<(), WorkflowError> {
        let url = self.endpoint(MODIFY_PATH)?;
        debug!(%url, action = action.as_str(), "POST modify");
        let resp = self
            .http
            .post(url)
            .json(&json!({ "action": action.as_str() }))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn fetch_result(&self) -> Result<Bytes, WorkflowError> {
        let url = self.endpoint(RESULT_PATH)?;
        debug!(%url, "GET result");
        let resp = self.http.get(url).send().await?;
        Ok(ensure_success(resp).await?.bytes().await?)
    }
}

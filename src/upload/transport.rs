use std::time::Duration;

use reqwest::multipart;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the network seam
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected upload: status {0}")]
    Status(reqwest::StatusCode),
}

/// The narrow contract to the recording backend.
///
/// Implementations deliver one segment (or one text marker) per call and
/// report success only on a 2xx response. Mocked in tests.
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Deliver one encoded audio segment for a session.
    async fn upload_segment(
        &self,
        session_id: &str,
        segment_id: u64,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), TransportError>;

    /// Deliver one text segment tagged with its recording-clock offset.
    async fn upload_text_segment(
        &self,
        session_id: &str,
        seek_end: f64,
        text: &str,
    ) -> Result<(), TransportError>;
}

/// JSON body of a text segment upload
#[derive(Debug, Serialize)]
struct TextSegmentBody<'a> {
    seek_end: f64,
    text: &'a str,
}

/// HTTP transport against the recording backend's REST endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for the given endpoint base URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        Self::build(endpoint, None)
    }

    /// Create a transport with a per-request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Self::build(endpoint, Some(timeout))
    }

    fn build(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl UploadTransport for HttpTransport {
    async fn upload_segment(
        &self,
        session_id: &str,
        segment_id: u64,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), TransportError> {
        let url = format!("{}/{}/{}", self.endpoint, session_id, segment_id);
        let size = data.len();

        let part = multipart::Part::bytes(data)
            .file_name(format!("segment-{segment_id}"))
            .mime_str(mime_type)?;
        let form = multipart::Form::new().part("audio_data", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        debug!("Uploaded segment {segment_id} ({size} bytes) to {url}");
        Ok(())
    }

    async fn upload_text_segment(
        &self,
        session_id: &str,
        seek_end: f64,
        text: &str,
    ) -> Result<(), TransportError> {
        let url = format!("{}/{}/upload-text-segment", self.endpoint, session_id);

        let response = self
            .client
            .post(&url)
            .json(&TextSegmentBody { seek_end, text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        debug!("Uploaded text segment at {seek_end:.2}s to {url}");
        Ok(())
    }
}

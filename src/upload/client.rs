use crate::error::TransportError;
use crate::upload::types::{ErrorBody, StatusResponse, UploadResponse, ZIP_MIME};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use std::time::Duration;

/// The three calls the client makes against the docs backend.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// `POST /upload` with the archive as multipart field `file`.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, TransportError>;

    /// `GET /status/{session_id}`.
    async fn status(&self, session_id: &str) -> Result<StatusResponse, TransportError>;

    /// `GET /download/{token}`, returning the archive bytes.
    async fn download(&self, token: &str) -> Result<Vec<u8>, TransportError>;
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Passes 2xx responses through and turns the rest into
    /// `TransportError::Status`, keeping a string `detail` if present.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::detail_text);
        Err(TransportError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, TransportError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(ZIP_MIME)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint(&["upload"]))
            .multipart(form)
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<UploadResponse>().await?)
    }

    async fn status(&self, session_id: &str) -> Result<StatusResponse, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["status", session_id]))
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<StatusResponse>().await?)
    }

    async fn download(&self, token: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["download", token]))
            .send()
            .await?;

        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

//! `reqwest` implementation of the dashboard API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use vigilant_core::{
    BatchResponse, ClientConfig, ClientError, FileHandle, MetricsSnapshot, ServerProgress,
};

use crate::assistant::{AssistantReply, AssistantResponse};
use crate::backend::ScanBackend;
use crate::routes;

/// HTTP client for the dashboard server.
///
/// The batch submission has no client-side timeout: the server may scan for
/// as long as it needs, and only cancellation ends the request early.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Create a backend for the configured server.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().build().map_err(ClientError::transport)?;
        info!(base_url = %config.base_url, "created dashboard client");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the current host metrics.
    pub async fn current_metrics(&self) -> Result<MetricsSnapshot, ClientError> {
        let request = self.client.get(self.config.endpoint(routes::METRICS_CURRENT));
        execute_json(request).await
    }

    /// Send a message to the assistant.
    ///
    /// The request is bounded by the configured assistant timeout; expiry is
    /// reported as [`AssistantReply::TimedOut`] rather than an error.
    pub async fn ask_assistant(&self, message: &str) -> Result<AssistantReply, ClientError> {
        let request = self
            .client
            .post(self.config.endpoint(routes::ASSISTANT_MESSAGE))
            .query(&[("message", message)])
            .timeout(self.config.assistant_timeout());

        match execute_json::<AssistantResponse>(request).await {
            Ok(response) => Ok(AssistantReply::Answer(response.ai_response)),
            Err(ClientError::Cancelled) => {
                debug!(timeout = ?self.config.assistant_timeout(), "assistant request timed out");
                Ok(AssistantReply::TimedOut)
            }
            Err(e) => Err(e),
        }
    }

    /// Build the multipart body, reading each file in selection order.
    async fn batch_form(files: &[FileHandle]) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for file in files {
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|e| ClientError::io(&file.path, &e))?;
            let part = Part::bytes(bytes).file_name(file.name.to_string());
            form = form.part(routes::FILES_FIELD, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn submit_batch(&self, files: &[FileHandle]) -> Result<BatchResponse, ClientError> {
        let form = Self::batch_form(files).await?;
        debug!(files = files.len(), "submitting scan batch");
        let request = self
            .client
            .post(self.config.endpoint(routes::SCAN_BATCH))
            .multipart(form);
        execute_json(request).await
    }

    async fn fetch_progress(&self) -> Result<ServerProgress, ClientError> {
        let request = self.client.get(self.config.endpoint(routes::SCAN_PROGRESS));
        execute_json(request).await
    }

    async fn request_abort(&self) -> Result<(), ClientError> {
        let request = self.client.post(self.config.endpoint(routes::SCAN_ABORT));
        let response = send(request).await?;
        let body = response.text().await.unwrap_or_default();
        debug!(%body, "server acknowledged abort");
        Ok(())
    }
}

/// Send a request, turning non-success statuses into [`ClientError::Http`].
async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

async fn execute_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    send(request)
        .await?
        .json::<T>()
        .await
        .map_err(map_reqwest_error)
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Cancelled
    } else if err.is_decode() {
        ClientError::Decode {
            message: err.to_string(),
        }
    } else {
        ClientError::transport(err)
    }
}

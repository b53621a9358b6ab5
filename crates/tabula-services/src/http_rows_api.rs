//! reqwest implementation of the row API

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tabula_core::FieldMap;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::rows_api::{RequestError, RowsApi};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowBody<'a> {
    workspace_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a FieldMap>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Row API over JSON/HTTP.
///
/// Routes: `POST {base}/api/table/{table}/rows`,
/// `PATCH|DELETE {base}/api/table/{table}/rows/{row}`.
#[derive(Debug, Clone)]
pub struct HttpRowsApi {
    client: Client,
    base_url: Url,
    table_id: String,
    workspace_id: String,
}

impl HttpRowsApi {
    pub fn new(config: &ClientConfig) -> ServiceResult<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ServiceError::Configuration(format!("Invalid base_url {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Configuration(format!(
                "base_url {} cannot be used as a base",
                config.base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            table_id: config.table_id().unwrap_or_default().to_string(),
            workspace_id: config.workspace_id().unwrap_or_default().to_string(),
        })
    }

    fn rows_url(&self, row_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "table", self.table_id.as_str(), "rows"]);
            if let Some(row_id) = row_id {
                segments.push(row_id);
            }
        }
        url
    }

    fn body<'a>(&'a self, data: Option<&'a FieldMap>) -> RowBody<'a> {
        RowBody {
            workspace_id: &self.workspace_id,
            data,
        }
    }
}

#[async_trait]
impl RowsApi for HttpRowsApi {
    async fn create_row(&self, data: &FieldMap) -> Result<(), RequestError> {
        let response = self
            .client
            .post(self.rows_url(None))
            .json(&self.body(Some(data)))
            .send()
            .await
            .map_err(RequestError::transport)?;
        check_response(response).await
    }

    async fn update_row(&self, row_id: &str, data: &FieldMap) -> Result<(), RequestError> {
        let response = self
            .client
            .patch(self.rows_url(Some(row_id)))
            .json(&self.body(Some(data)))
            .send()
            .await
            .map_err(RequestError::transport)?;
        check_response(response).await
    }

    async fn delete_row(&self, row_id: &str) -> Result<(), RequestError> {
        let response = self
            .client
            .delete(self.rows_url(Some(row_id)))
            .json(&self.body(None))
            .send()
            .await
            .map_err(RequestError::transport)?;
        check_response(response).await
    }
}

async fn check_response(response: Response) -> Result<(), RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    // Body is best effort; an unreadable body just means no server message
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "Row request failed");
    Err(RequestError::status(status.as_u16(), parse_error_message(&body)))
}

/// Pull the `error` field out of a failure body
fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
}

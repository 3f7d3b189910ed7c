//! Portal REST API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use super::FlowBackend;
use crate::config::ApiConfig;
use crate::error::AppError;
use crate::models::{
    CanvasState, CreateFlowItemRequest, CreatedFlowItem, FlowChain, SaveCanvasRequest,
    SavedCanvas,
};

/// Error body returned by the portal API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    /// Present on version conflicts.
    #[serde(default)]
    current_version: Option<i64>,
}

/// Optional body of a successful canvas save.
#[derive(Debug, Deserialize)]
struct SaveBody {
    version: Option<i64>,
}

/// [`FlowBackend`] speaking to the portal's REST endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::Validation(format!("invalid api token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of a work-request sub-resource.
    fn url(&self, work_request_id: i64, resource: &str) -> String {
        format!(
            "{}/work-requests/{}/{}",
            self.base_url, work_request_id, resource
        )
    }

    fn request(&self, method: Method, work_request_id: i64, resource: &str) -> RequestBuilder {
        self.client.request(method, self.url(work_request_id, resource))
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        expected_version: Option<i64>,
    ) -> Result<T, AppError> {
        let response = Self::check_status(response, expected_version).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(
        response: Response,
        expected_version: Option<i64>,
    ) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, &text, expected_version))
    }
}

/// Map a non-success response to the error taxonomy.
fn status_error(status: StatusCode, body: &str, expected_version: Option<i64>) -> AppError {
    let body: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = body.message.unwrap_or_default();

    match (status, expected_version) {
        (StatusCode::CONFLICT, Some(expected)) => AppError::VersionConflict {
            expected,
            actual: body.current_version,
        },
        (StatusCode::NOT_FOUND, _) => AppError::NotFound(if message.is_empty() {
            "resource not found".to_string()
        } else {
            message
        }),
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            AppError::Validation(message)
        }
        _ => AppError::Backend(message),
    }
}

#[async_trait]
impl FlowBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn get_flow_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError> {
        let response = self
            .request(Method::GET, work_request_id, "flow-chain")
            .send()
            .await?;
        Self::read_json(response, None).await
    }

    #[instrument(skip(self, request), fields(item_type = %request.item_type))]
    async fn create_flow_item(
        &self,
        work_request_id: i64,
        request: &CreateFlowItemRequest,
    ) -> Result<CreatedFlowItem, AppError> {
        let response = self
            .request(Method::POST, work_request_id, "flow-items")
            .json(request)
            .send()
            .await?;
        Self::read_json(response, None).await
    }

    #[instrument(skip(self))]
    async fn get_flow_ui(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
        let response = self
            .request(Method::GET, work_request_id, "flow-ui")
            .send()
            .await?;
        Self::read_json(response, None).await
    }

    #[instrument(skip(self, request), fields(expected_version = request.expected_version))]
    async fn put_flow_ui(
        &self,
        work_request_id: i64,
        request: &SaveCanvasRequest,
    ) -> Result<SavedCanvas, AppError> {
        let response = self
            .request(Method::PUT, work_request_id, "flow-ui")
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response, Some(request.expected_version)).await?;

        // The portal may answer with an empty body; the new version is then
        // the one the server must have assigned.
        let text = response.text().await?;
        let version = serde_json::from_str::<SaveBody>(&text)
            .ok()
            .and_then(|body| body.version)
            .unwrap_or(request.expected_version + 1);
        Ok(SavedCanvas { version })
    }
}

//! Thin Azure Resource Manager REST client
//!
//! Every call carries an explicit `api-version`. Long-running PUTs and
//! DELETEs are awaited by polling the resource until ARM reports a terminal
//! provisioning state (or the resource is gone); a failed or canceled
//! operation is surfaced as-is.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wasm_aks_common::poll::poll_until;
use wasm_aks_common::{Error, Result};

use crate::auth::TokenSource;

/// Public ARM endpoint
pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// Provider name used in errors
pub const PROVIDER: &str = "azure";

/// Upper bound on awaiting a long-running operation
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(45 * 60);

/// Interval between provisioning-state checks
pub const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// HTTP request timeout for a single ARM call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// An ARM resource that reports a provisioning state
pub trait Provisioned {
    /// The `properties.provisioningState` value, if present
    fn provisioning_state(&self) -> Option<&str>;
}

/// Where a provisioning state leaves a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still running
    InProgress,
    /// Done
    Succeeded,
    /// Ended in `Failed` or `Canceled`
    Failed,
}

impl OperationStatus {
    /// Classify a provisioning state; a missing state means the resource
    /// type provisions synchronously
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            None => Self::Succeeded,
            Some(s) if s.eq_ignore_ascii_case("Succeeded") => Self::Succeeded,
            Some(s) if s.eq_ignore_ascii_case("Failed") || s.eq_ignore_ascii_case("Canceled") => {
                Self::Failed
            }
            Some(_) => Self::InProgress,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Render an ARM error response body as a single message
pub fn arm_error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ArmErrorBody>(body)
        .ok()
        .and_then(|b| b.error);

    match detail {
        Some(ArmErrorDetail {
            code: Some(code),
            message: Some(message),
        }) => format!("{}: {}", code, message),
        Some(ArmErrorDetail {
            code: None,
            message: Some(message),
        }) => message,
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body.trim()),
    }
}

/// Authenticated ARM client scoped to one subscription
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    tokens: Arc<TokenSource>,
}

impl ArmClient {
    /// Create a client against the public ARM endpoint
    pub fn new(subscription_id: impl Into<String>, tokens: TokenSource) -> Result<Self> {
        Self::with_endpoint(ARM_ENDPOINT, subscription_id, tokens)
    }

    /// Create a client against a specific ARM endpoint (sovereign clouds)
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        subscription_id: impl Into<String>,
        tokens: TokenSource,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            tokens: Arc::new(tokens),
        })
    }

    /// Subscription all paths are built under
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// `/subscriptions/{id}`
    pub fn subscription_path(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    /// `/subscriptions/{id}/resourceGroups/{name}`
    pub fn resource_group_path(&self, resource_group: &str) -> String {
        format!("{}/resourceGroups/{}", self.subscription_path(), resource_group)
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let token = self.tokens.token().await?;
        debug!(method = %method, path = %path, api_version = %api_version, "ARM request");

        let mut request = self
            .http
            .request(method, self.url(path, api_version))
            .bearer_auth(token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    async fn into_error(path: &str, response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::provider_status(
            PROVIDER,
            path,
            status.as_u16(),
            arm_error_message(status, &body),
        )
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(path, e.to_string()))
    }

    /// GET a resource; `None` if it does not exist
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<Option<T>> {
        let response = self
            .send::<()>(Method::GET, path, api_version, None)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Self::decode(path, response).await.map(Some),
            _ => Err(Self::into_error(path, response).await),
        }
    }

    /// PUT a resource and return ARM's immediate response
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(Method::PUT, path, api_version, Some(body))
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(path, response).await);
        }
        Self::decode(path, response).await
    }

    /// POST an action (e.g. a credential listing) without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T> {
        let response = self
            .send::<()>(Method::POST, path, api_version, None)
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(path, response).await);
        }
        Self::decode(path, response).await
    }

    /// DELETE a resource; `false` if there was nothing to delete
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<bool> {
        let response = self
            .send::<()>(Method::DELETE, path, api_version, None)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(Self::into_error(path, response).await),
        }
    }

    /// PUT a resource and wait for it to reach a terminal provisioning state
    pub async fn put_and_wait<B, T>(&self, path: &str, api_version: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Provisioned,
    {
        let accepted: T = self.put(path, api_version, body).await?;
        match OperationStatus::from_state(accepted.provisioning_state()) {
            OperationStatus::Succeeded => return Ok(accepted),
            OperationStatus::Failed => {
                return Err(failed_operation(path, accepted.provisioning_state()))
            }
            OperationStatus::InProgress => {}
        }

        info!(
            path = %path,
            state = accepted.provisioning_state().unwrap_or_default(),
            "Waiting for ARM operation"
        );

        poll_until(
            OPERATION_TIMEOUT,
            OPERATION_POLL_INTERVAL,
            format!("timed out waiting for {} to provision", path),
            move || async move {
                let current: Option<T> = self.get(path, api_version).await?;
                let Some(current) = current else {
                    return Err(Error::provider(
                        PROVIDER,
                        path,
                        "resource disappeared while provisioning",
                    ));
                };
                match OperationStatus::from_state(current.provisioning_state()) {
                    OperationStatus::Succeeded => Ok(Some(current)),
                    OperationStatus::Failed => {
                        Err(failed_operation(path, current.provisioning_state()))
                    }
                    OperationStatus::InProgress => Ok(None),
                }
            },
        )
        .await
    }

    /// DELETE a resource and wait until GET no longer finds it
    ///
    /// `T` is only used to read the resource while waiting.
    pub async fn delete_and_wait<T: DeserializeOwned + Provisioned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<()> {
        if !self.delete(path, api_version).await? {
            debug!(path = %path, "Nothing to delete");
            return Ok(());
        }

        poll_until(
            OPERATION_TIMEOUT,
            OPERATION_POLL_INTERVAL,
            format!("timed out waiting for {} to be deleted", path),
            move || async move {
                let current: Option<T> = self.get(path, api_version).await?;
                match current {
                    None => Ok(Some(())),
                    Some(c)
                        if OperationStatus::from_state(c.provisioning_state())
                            == OperationStatus::Failed =>
                    {
                        Err(failed_operation(path, c.provisioning_state()))
                    }
                    Some(_) => Ok(None),
                }
            },
        )
        .await
    }
}

fn failed_operation(path: &str, state: Option<&str>) -> Error {
    Error::provider(
        PROVIDER,
        path,
        format!(
            "operation ended in provisioning state {}",
            state.unwrap_or("unknown")
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_classification() {
        assert_eq!(OperationStatus::from_state(None), OperationStatus::Succeeded);
        assert_eq!(
            OperationStatus::from_state(Some("Succeeded")),
            OperationStatus::Succeeded
        );
        assert_eq!(
            OperationStatus::from_state(Some("Creating")),
            OperationStatus::InProgress
        );
        assert_eq!(
            OperationStatus::from_state(Some("Updating")),
            OperationStatus::InProgress
        );
        assert_eq!(
            OperationStatus::from_state(Some("Failed")),
            OperationStatus::Failed
        );
        assert_eq!(
            OperationStatus::from_state(Some("Canceled")),
            OperationStatus::Failed
        );
    }

    #[test]
    fn test_arm_error_message_with_code() {
        let body = r#"{"error":{"code":"QuotaExceeded","message":"Not enough cores"}}"#;
        assert_eq!(
            arm_error_message(StatusCode::CONFLICT, body),
            "QuotaExceeded: Not enough cores"
        );
    }

    #[test]
    fn test_arm_error_message_without_body() {
        assert_eq!(
            arm_error_message(StatusCode::FORBIDDEN, ""),
            "HTTP 403 Forbidden"
        );
        assert_eq!(
            arm_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "HTTP 502 Bad Gateway: upstream down"
        );
    }

    #[test]
    fn test_paths_and_urls() {
        let client = ArmClient::with_endpoint(
            "https://arm.example/",
            "sub-1",
            TokenSource::fixed("t"),
        )
        .unwrap();

        assert_eq!(
            client.resource_group_path("wasm-aks-rg"),
            "/subscriptions/sub-1/resourceGroups/wasm-aks-rg"
        );
        assert_eq!(
            client.url("/subscriptions/sub-1", "2022-09-01"),
            "https://arm.example/subscriptions/sub-1?api-version=2022-09-01"
        );
    }
}

//! ARM client - JSON over HTTPS against Azure Resource Manager
//!
//! Every request carries the `api-version` query parameter, a bearer token
//! and a fresh correlation ID. Mutations that answer with
//! `Azure-AsyncOperation` or `Location` headers are polled to completion at a
//! fixed interval.

use std::time::Duration;

use azurerm_core::poll::{PollError, RefreshResult, StateChangeConf};
use azurerm_core::provider::ProviderError;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::TokenCredential;

const CORRELATION_HEADER: &str = "x-ms-correlation-request-id";
const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";
const PROVIDERS_API_VERSION: &str = "2022-09-01";

const IN_PROGRESS: &str = "InProgress";
const SUCCEEDED: &str = "Succeeded";

#[derive(Debug, Error)]
pub enum ArmError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} with error: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("obtaining an access token: {0}")]
    Credential(ProviderError),

    #[error("polling long-running operation: {0}")]
    Poll(#[from] PollError),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ArmError {
    /// HTTP status of the failed request, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Api { status, .. } => Some(*status),
            ArmError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<ArmError> for ProviderError {
    fn from(e: ArmError) -> Self {
        ProviderError::new(e.to_string()).with_cause(e)
    }
}

/// How a mutation reports completion
#[derive(Debug, Clone, PartialEq, Eq)]
enum LongRunning {
    /// Poll the URL's `status` field until it is terminal
    AsyncOperation(String),
    /// Poll the URL while it answers 202
    Location(String),
}

/// Resource Manager REST client
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Box<dyn TokenCredential>,
    poll_interval: Duration,
}

impl ArmClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        credential: Box<dyn TokenCredential>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
            poll_interval: Duration::from_secs(10),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    // =========================================================================
    // REST Methods
    // =========================================================================

    /// GET a resource; `None` when it does not exist
    pub async fn get(&self, path: &str, api_version: &str) -> Result<Option<JsonValue>, ArmError> {
        let response = self
            .send(Method::GET, path, Some(api_version), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        read_body(response).await.map(Some)
    }

    /// PUT a resource, waiting for any long-running operation
    pub async fn put(
        &self,
        path: &str,
        api_version: &str,
        body: &JsonValue,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ArmError> {
        self.mutate(Method::PUT, path, api_version, Some(body), timeout)
            .await
    }

    /// PATCH a resource, waiting for any long-running operation
    pub async fn patch(
        &self,
        path: &str,
        api_version: &str,
        body: &JsonValue,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ArmError> {
        self.mutate(Method::PATCH, path, api_version, Some(body), timeout)
            .await
    }

    /// POST an action, waiting for any long-running operation
    pub async fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&JsonValue>,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ArmError> {
        self.mutate(Method::POST, path, api_version, body, timeout)
            .await
    }

    /// DELETE a resource; one that is already gone counts as deleted
    pub async fn delete(
        &self,
        path: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Result<(), ArmError> {
        let response = self
            .send(Method::DELETE, path, Some(api_version), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("{} was already deleted", path);
            return Ok(());
        }
        let response = check_status(response).await?;
        if let Some(operation) = long_running(&response) {
            self.wait_for_operation(operation, timeout).await?;
        }
        Ok(())
    }

    /// GET every item of a collection, following `nextLink`
    pub async fn list(&self, path: &str, api_version: &str) -> Result<Vec<JsonValue>, ArmError> {
        let mut items = Vec::new();
        let mut response = self
            .send(Method::GET, path, Some(api_version), None)
            .await?;

        loop {
            let page = read_body(check_status(response).await?).await?;
            if let Some(values) = page.get("value").and_then(|v| v.as_array()) {
                items.extend(values.iter().cloned());
            }
            match page.get("nextLink").and_then(|v| v.as_str()) {
                Some(next) if !next.is_empty() => {
                    response = self.send(Method::GET, next, None, None).await?;
                }
                _ => return Ok(items),
            }
        }
    }

    /// Whether `url` answers at all, regardless of status
    ///
    /// Used for data plane endpoints, which need a different token audience.
    pub async fn probe(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{} is not reachable yet: {}", url, e);
                false
            }
        }
    }

    // =========================================================================
    // Resource Provider Registration
    // =========================================================================

    /// Register a resource provider namespace unless it already is
    pub async fn register_provider(
        &self,
        subscription_id: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<(), ArmError> {
        let path = format!("/subscriptions/{}/providers/{}", subscription_id, namespace);
        let state = self
            .get(&path, PROVIDERS_API_VERSION)
            .await?
            .and_then(|body| registration_state(&body));
        if state.as_deref() == Some("Registered") {
            return Ok(());
        }

        log::info!("Registering resource provider {}", namespace);
        self.post(
            &format!("{}/register", path),
            PROVIDERS_API_VERSION,
            None,
            timeout,
        )
        .await?;

        StateChangeConf::new(&["NotRegistered", "Unregistered", "Registering"], &["Registered"], timeout)
            .with_poll_interval(self.poll_interval)
            .wait_for_state(|| self.refresh_registration(&path))
            .await?;
        Ok(())
    }

    async fn refresh_registration(&self, path: &str) -> RefreshResult<()> {
        let body = self.get(path, PROVIDERS_API_VERSION).await?;
        Ok(body.map(|body| ((), registration_state(&body).unwrap_or_default())))
    }

    // =========================================================================
    // Long-running Operations
    // =========================================================================

    async fn mutate(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&JsonValue>,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ArmError> {
        let response = self.send(method, path, Some(api_version), body).await?;
        let response = check_status(response).await?;
        match long_running(&response) {
            Some(operation) => self.wait_for_operation(operation, timeout).await,
            None => {
                let body = read_body(response).await?;
                Ok((!body.is_null()).then_some(body))
            }
        }
    }

    async fn wait_for_operation(
        &self,
        operation: LongRunning,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ArmError> {
        log::debug!("Waiting for long-running operation {:?}", operation);
        let conf = StateChangeConf::new(&[IN_PROGRESS], &[SUCCEEDED], timeout)
            .with_poll_interval(self.poll_interval);

        let result = match &operation {
            LongRunning::AsyncOperation(url) => {
                conf.wait_for_state(|| self.refresh_async_operation(url))
                    .await?
            }
            LongRunning::Location(url) => conf.wait_for_state(|| self.refresh_location(url)).await?,
        };
        Ok(result.filter(|body| !body.is_null()))
    }

    async fn refresh_async_operation(&self, url: &str) -> RefreshResult<JsonValue> {
        let response = self.send(Method::GET, url, None, None).await?;
        let body = read_body(check_status(response).await?).await?;

        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        match status.to_lowercase().as_str() {
            "succeeded" => Ok(Some((body, SUCCEEDED.to_string()))),
            "failed" | "canceled" | "cancelled" => {
                let (code, message) = error_details(&body);
                Err(ProviderError::new(format!(
                    "the operation {}: {}: {}",
                    status, code, message
                )))
            }
            _ => Ok(Some((body, IN_PROGRESS.to_string()))),
        }
    }

    async fn refresh_location(&self, url: &str) -> RefreshResult<JsonValue> {
        let response = self.send(Method::GET, url, None, None).await?;
        let response = check_status(response).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Ok(Some((JsonValue::Null, IN_PROGRESS.to_string())));
        }
        let body = read_body(response).await?;
        Ok(Some((body, SUCCEEDED.to_string())))
    }

    // =========================================================================
    // Request Helpers
    // =========================================================================

    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{}", self.endpoint, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        api_version: Option<&str>,
        body: Option<&JsonValue>,
    ) -> Result<Response, ArmError> {
        let token = self.credential.token().await.map_err(ArmError::Credential)?;
        let url = self.url(path);
        log::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, Uuid::new_v4().to_string());
        if let Some(api_version) = api_version {
            request = request.query(&[("api-version", api_version)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }
}

fn long_running(response: &Response) -> Option<LongRunning> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    if let Some(url) = header(ASYNC_OPERATION_HEADER) {
        return Some(LongRunning::AsyncOperation(url));
    }
    if response.status() == StatusCode::ACCEPTED
        && let Some(url) = header(reqwest::header::LOCATION.as_str())
    {
        return Some(LongRunning::Location(url));
    }
    None
}

async fn check_status(response: Response) -> Result<Response, ArmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<JsonValue>(&text) {
        Ok(body) => error_details(&body),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_string(),
            text,
        ),
    };
    Err(ArmError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

async fn read_body(response: Response) -> Result<JsonValue, ArmError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&text).map_err(|e| ArmError::InvalidResponse(e.to_string()))
}

/// `(code, message)` of an ARM error body `{"error": {"code", "message"}}`
fn error_details(body: &JsonValue) -> (String, String) {
    let error = body.get("error").unwrap_or(body);
    let field = |name: &str| {
        error
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    (field("code"), field("message"))
}

fn registration_state(body: &JsonValue) -> Option<String> {
    body.get("registrationState")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_VERSION: &str = "2022-09-01";
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn client(server: &MockServer) -> ArmClient {
        ArmClient::new(
            reqwest::Client::new(),
            server.uri(),
            Box::new(StaticToken::new("token")),
        )
        .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn get_sends_api_version_token_and_correlation_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/resourceGroups/rg"))
            .and(query_param("api-version", API_VERSION))
            .and(header("Authorization", "Bearer token"))
            .and(header_exists(CORRELATION_HEADER))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "rg", "location": "westeurope"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server)
            .get("/subscriptions/sub/resourceGroups/rg", API_VERSION)
            .await
            .unwrap();
        assert_eq!(body, Some(json!({"name": "rg", "location": "westeurope"})));
    }

    #[tokio::test]
    async fn get_not_found_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/resourceGroups/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceGroupNotFound", "message": "Resource group 'missing' could not be found."}
            })))
            .mount(&server)
            .await;

        let body = client(&server)
            .get("/subscriptions/sub/resourceGroups/missing", API_VERSION)
            .await
            .unwrap();
        assert_eq!(body, None);
    }

    #[tokio::test]
    async fn api_errors_carry_code_and_message() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/subscriptions/sub/resourceGroups/rg"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": "ResourceGroupBeingDeleted", "message": "The resource group 'rg' is in deprovisioning state."}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .put(
                "/subscriptions/sub/resourceGroups/rg",
                API_VERSION,
                &json!({"location": "westeurope"}),
                TIMEOUT,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "unexpected status 409 with error: ResourceGroupBeingDeleted: The resource group 'rg' is in deprovisioning state."
        );
    }

    #[tokio::test]
    async fn put_waits_for_async_operation() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/op1", server.uri());

        Mock::given(method("PUT"))
            .and(path("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/sa"))
            .and(body_json(json!({"location": "westeurope"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header(ASYNC_OPERATION_HEADER, operation_url.as_str())
                    .set_body_json(json!({"properties": {"provisioningState": "Creating"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .put(
                "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/sa",
                "2023-01-01",
                &json!({"location": "westeurope"}),
                TIMEOUT,
            )
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"status": "Succeeded"})));
    }

    #[tokio::test]
    async fn failed_async_operation_surfaces_error() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/op2", server.uri());

        Mock::given(method("PATCH"))
            .and(path("/subscriptions/sub/resourceGroups/rg"))
            .respond_with(
                ResponseTemplate::new(202).insert_header(ASYNC_OPERATION_HEADER, operation_url.as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/op2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {"code": "QuotaExceeded", "message": "Operation results in exceeding quota limits."}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .patch("/subscriptions/sub/resourceGroups/rg", API_VERSION, &json!({}), TIMEOUT)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("the operation Failed: QuotaExceeded: Operation results in exceeding quota limits."),
            "{}",
            err
        );
    }

    #[tokio::test]
    async fn delete_polls_location_while_accepted() {
        let server = MockServer::start().await;
        let location = format!("{}/operationResults/del1", server.uri());

        Mock::given(method("DELETE"))
            .and(path("/subscriptions/sub/resourceGroups/rg"))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operationResults/del1"))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operationResults/del1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete("/subscriptions/sub/resourceGroups/rg", API_VERSION, TIMEOUT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_of_missing_resource_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/subscriptions/sub/resourceGroups/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(
            client(&server)
                .delete("/subscriptions/sub/resourceGroups/gone", API_VERSION, TIMEOUT)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn list_follows_next_link() {
        let server = MockServer::start().await;
        let next_link = format!("{}/subscriptions/sub/resourceGroups/rg/resources/page2", server.uri());

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/resourceGroups/rg/resources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "a"}, {"name": "b"}],
                "nextLink": next_link
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/resourceGroups/rg/resources/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "c"}]})))
            .mount(&server)
            .await;

        let items = client(&server)
            .list("/subscriptions/sub/resourceGroups/rg/resources", API_VERSION)
            .await
            .unwrap();
        let names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn register_provider_when_not_registered() {
        let server = MockServer::start().await;
        let provider_path = "/subscriptions/sub/providers/Microsoft.KeyVault";

        Mock::given(method("GET"))
            .and(path(provider_path))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"registrationState": "NotRegistered"})),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/register", provider_path)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"registrationState": "Registering"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(provider_path))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"registrationState": "Registered"})),
            )
            .mount(&server)
            .await;

        client(&server)
            .register_provider("sub", "Microsoft.KeyVault", TIMEOUT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registered_provider_is_left_alone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/providers/Microsoft.Storage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"registrationState": "Registered"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client(&server)
            .register_provider("sub", "Microsoft.Storage", TIMEOUT)
            .await
            .unwrap();
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    decode::{decode_payload, decode_response},
    retry::{AttemptError, Transient},
    wait, ApiError, ClientOptions, MemoryTokenStore, ProgressNotifier, Result, RetryPolicy,
    SessionGuard, StoredToken, TokenProvider, TokenStore,
};

/// One call against the console API: method, path, optional JSON body and
/// extra headers.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<JsonValue>,
    headers: HeaderMap,
}

impl ApiRequest {
    /// Starts a request with `method` for `path` under the base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// Starts a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Starts a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::InvalidRequest(format!("body is not serializable: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Adds a header that replaces the client's default of the same name.
    /// `Authorization` is always derived from the current token.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// HTTP method of this request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path appended to the client's base URL.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Clone)]
/// Resilient JSON client every console page routes its API calls through.
///
/// Transient failures (timeouts, connection errors, 503) are retried on a
/// short schedule while [`RetryStatus`](crate::RetryStatus) events go out on
/// the [`ProgressNotifier`]. A 401 fires the [`SessionGuard`] and returns
/// [`ApiError::SessionExpired`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
    policy: RetryPolicy,
    tokens: Arc<dyn TokenProvider>,
    session: SessionGuard,
    progress: ProgressNotifier,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .field("session", &self.session)
            .field("progress", &self.progress)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client for `base_url` with default options, an empty
    /// in-memory token store and fresh guard/notifier instances.
    pub fn new(base_url: impl Into<String>) -> Self {
        let options = ClientOptions::default();
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url.into()),
            policy: RetryPolicy::from_options(&options),
            options,
            tokens: Arc::new(StoredToken::new(MemoryTokenStore::new())),
            session: SessionGuard::new(),
            progress: ProgressNotifier::new(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `CONSOLE_API_BASE_URL` (required)
    /// - `CONSOLE_API_TIMEOUT_MS`, `CONSOLE_API_MAX_RETRIES` (optional,
    ///   see [`ClientOptions::from_env`])
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("CONSOLE_API_BASE_URL")
            .map_err(|_| "missing CONSOLE_API_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("CONSOLE_API_BASE_URL is set but empty".to_owned());
        }
        let options = ClientOptions::from_env()?;
        Ok(Self::new(base_url).with_options(options))
    }

    /// Applies timeout and retry options.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.policy = RetryPolicy::from_options(&opts);
        self.options = opts;
        self
    }

    /// Uses `provider` as the bearer token source.
    pub fn with_token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.tokens = Arc::new(provider);
        self
    }

    /// Reads the bearer token from `store` under the default key.
    pub fn with_token_store(self, store: impl TokenStore + 'static) -> Self {
        self.with_token_provider(StoredToken::new(store))
    }

    /// Shares `guard` with the session-owning layer.
    pub fn with_session_guard(mut self, guard: SessionGuard) -> Self {
        self.session = guard;
        self
    }

    /// Shares `notifier` with the UI layer.
    pub fn with_progress(mut self, notifier: ProgressNotifier) -> Self {
        self.progress = notifier;
        self
    }

    /// Guard notified whenever a request is rejected with 401.
    pub fn session_guard(&self) -> &SessionGuard {
        &self.session
    }

    /// Notifier that receives a [`RetryStatus`](crate::RetryStatus) before each retry.
    pub fn progress(&self) -> &ProgressNotifier {
        &self.progress
    }

    /// Base URL every request path is appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a GET and converts the JSON payload into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let payload = self.send(ApiRequest::get(path)).await?;
        decode_payload(payload)
    }

    /// Sends a POST with a JSON `body` and converts the payload into `T`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.send(ApiRequest::post(path).json(body)?).await?;
        decode_payload(payload)
    }

    /// Sends a PUT with a JSON `body` and converts the payload into `T`.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.send(ApiRequest::put(path).json(body)?).await?;
        decode_payload(payload)
    }

    /// Sends a DELETE and converts the JSON payload into `T`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let payload = self.send(ApiRequest::delete(path)).await?;
        decode_payload(payload)
    }

    /// Wakes a cold backend by issuing a GET through the full retry
    /// pipeline, discarding the payload.
    pub async fn warm_up(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::get(path)).await.map(|_| ())
    }

    /// Sends `request`, retrying transient failures, and returns the JSON
    /// payload of the first successful attempt.
    pub async fn send(&self, request: ApiRequest) -> Result<JsonValue> {
        let mut retries = 0usize;
        loop {
            let transient = match self.attempt(&request).await {
                Ok(payload) => return Ok(payload),
                Err(AttemptError::Terminal(err)) => return Err(err),
                Err(AttemptError::Transient(transient)) => transient,
            };

            if !self.policy.allows_retry(retries) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    cause = transient.describe(),
                    attempts = retries + 1,
                    "giving up after retries"
                );
                return Err(transient.exhausted());
            }

            retries += 1;
            let delay = self.policy.delay_for(retries);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                cause = transient.describe(),
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );

            self.progress.publish(&self.policy.status_for(retries));
            wait::pause(delay).await;
        }
    }

    /// Issues one attempt of `request` bounded by the configured timeout.
    async fn attempt(&self, request: &ApiRequest) -> std::result::Result<JsonValue, AttemptError> {
        let headers = self.headers_for(request)?;
        let mut builder = self
            .http
            .request(request.method.clone(), self.url_for(&request.path))
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let timeout = Duration::from_millis(self.options.timeout_ms);
        let (status, body) = match wait::race(timeout, exchange).await {
            Some(Ok(received)) => received,
            Some(Err(err)) => return Err(classify_transport(err)),
            None => return Err(AttemptError::Transient(Transient::TimedOut)),
        };

        if status == StatusCode::UNAUTHORIZED {
            self.session.notify();
            return Err(AttemptError::Terminal(ApiError::SessionExpired));
        }

        decode_response(status, &body)
    }

    fn headers_for(&self, request: &ApiRequest) -> std::result::Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        headers.remove(header::AUTHORIZATION);
        if let Some(token) = self.tokens.current_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::InvalidRequest("token is not a valid header value".to_owned()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn url_for(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() {
            self.base_url.clone()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

fn classify_transport(err: reqwest::Error) -> AttemptError {
    if err.is_builder() {
        return AttemptError::Terminal(ApiError::InvalidRequest(err.to_string()));
    }
    if err.is_timeout() {
        return AttemptError::Transient(Transient::TimedOut);
    }
    AttemptError::Transient(Transient::Unreachable(err))
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_owned()
}

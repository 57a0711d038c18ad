//! HTTP client for the booking platform's central API.
//!
//! Wraps `reqwest` with the platform's application headers, the user's
//! session cookie, status mapping (401/403 become [`ClientError::AuthExpired`]),
//! and typed response decoding.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::retry::{retry_with_backoff, Backoff};

const APPLICATION_KEY_HEADER: &str = "application-api-key";
const APPLICATION_NAME_HEADER: &str = "application-name";

/// Everything needed to talk to the platform on behalf of one user.
///
/// The session cookie is an explicit value here rather than ambient browser
/// state; nothing outside this client ever sees it.
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub application_key: String,
    pub application_name: String,
    pub session_cookie: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub organization_id: i64,
    pub service_type_id: i64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl ClientSettings {
    #[must_use]
    pub fn from_app_config(config: &slotwatch_core::AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            application_key: config.application_key.clone(),
            application_name: config.application_name.clone(),
            session_cookie: config.session_cookie.clone(),
            user_agent: config.user_agent.clone(),
            timeout_secs: config.request_timeout_secs,
            organization_id: config.organization_id,
            service_type_id: config.service_type_id,
            max_retries: config.max_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
        }
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("application_key", &"[redacted]")
            .field("application_name", &self.application_name)
            .field("session_cookie", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("organization_id", &self.organization_id)
            .field("service_type_id", &self.service_type_id)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .finish()
    }
}

/// Client for the booking platform's central API.
///
/// Implements [`slotwatch_core::RemoteBookingService`] (see `booking.rs`) and
/// [`slotwatch_core::VisitPreparer`] (see `visit.rs`).
pub struct BookingClient {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) organization_id: i64,
    pub(crate) service_type_id: i64,
    pub(crate) backoff: Backoff,
}

impl BookingClient {
    /// Builds a client with the settings' headers installed on every request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if the base URL or a header
    /// value is unusable, or [`ClientError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(APPLICATION_KEY_HEADER),
            header_value("application key", &settings.application_key)?,
        );
        headers.insert(
            HeaderName::from_static(APPLICATION_NAME_HEADER),
            header_value("application name", &settings.application_name)?,
        );
        let mut cookie = header_value("session cookie", &settings.session_cookie)?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // `Url::join` appends endpoint names instead of replacing the last segment.
        let normalised = format!("{}/", settings.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            ClientError::InvalidConfig(format!("invalid base URL '{}': {e}", settings.base_url))
        })?;

        Ok(Self {
            client,
            base_url,
            organization_id: settings.organization_id,
            service_type_id: settings.service_type_id,
            backoff: Backoff {
                retries: settings.max_retries,
                base: Duration::from_millis(settings.retry_backoff_base_ms),
            },
        })
    }

    /// Resolves an endpoint path against the base URL.
    pub(crate) fn endpoint_url(&self, endpoint: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid endpoint '{endpoint}': {e}")))
    }

    /// Sends a GET with `query`, retrying transient failures, and decodes the body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.endpoint_url(endpoint)?;
        retry_with_backoff(self.backoff, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url).query(query).send().await?;
                let response = Self::check_status(response)?;
                Self::decode(response, endpoint).await
            }
        })
        .await
    }

    /// Sends a POST with an optional JSON body and decodes the response.
    ///
    /// Not retried: visit preparation creates server-side state.
    pub(crate) async fn post_json<B, T>(&self, url: Url, body: Option<&B>) -> Result<T, ClientError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let context = url.path().to_owned();
        let mut request = self.client.post(url);
        request = match body {
            Some(body) => request.json(body),
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        let response = Self::check_status(request.send().await?)?;
        Self::decode(response, &context).await
    }

    /// Maps 401/403 to [`ClientError::AuthExpired`] and any other non-2xx
    /// status to [`ClientError::UnexpectedStatus`].
    pub(crate) fn check_status(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::AuthExpired {
                url: response.url().to_string(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    pub(crate) async fn decode<T: DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T, ClientError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

fn header_value(label: &str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::InvalidConfig(format!("invalid {label} header value: {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

//! Per-account HTTP client for the game API.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Proxy};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::GameError;
use crate::config::ProxyConfig;
use crate::telegram::GAME_APP_URL;

/// Maximum number of body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// A single request against the game API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A response body, structured when the server declared JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    Text(String),
}

impl ApiBody {
    /// Decodes the body into a typed value.
    ///
    /// Text bodies are parsed as JSON on demand.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Decode`] if the body does not match `T`.
    pub fn parse<T: DeserializeOwned>(self, what: &str) -> Result<T, GameError> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(|e| GameError::decode(what, e)),
            Self::Text(text) => serde_json::from_str(&text).map_err(|e| GameError::decode(what, e)),
        }
    }
}

/// A response whose status was not checked.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl RawResponse {
    /// Whether the server answered exactly `200 OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Persistent connection context of one account.
///
/// Holds the fixed headers, the optional proxy binding and the request
/// timeout for the lifetime of a worker.
#[derive(Debug, Clone)]
pub struct GameHttpClient {
    http: reqwest::Client,
}

impl GameHttpClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if a header or the proxy is invalid.
    pub fn new(
        user_agent: Option<&str>,
        proxy: Option<&ProxyConfig>,
        timeout: Duration,
    ) -> Result<Self, GameError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert("priority", HeaderValue::from_static("u=1, i"));
        headers.insert(header::ORIGIN, HeaderValue::from_static(GAME_APP_URL));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout);

        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(proxy) = proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let http = builder
            .build()
            .map_err(|e| GameError::ClientBuild(e.to_string()))?;
        Ok(Self { http })
    }

    /// Sends a request and fails on any non-2xx status.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or [`GameError::Status`] for non-2xx answers.
    pub async fn send(
        &self,
        request: &ApiRequest,
        authorization: Option<&str>,
    ) -> Result<ApiBody, GameError> {
        let response = self.send_raw(request, authorization).await?;
        if (200..300).contains(&response.status) {
            return Ok(response.body);
        }

        let body = match response.body {
            ApiBody::Json(value) => value.to_string(),
            ApiBody::Text(text) => text,
        };
        Err(GameError::Status {
            status: response.status,
            body: truncate(&body, ERROR_BODY_LIMIT),
        })
    }

    /// Sends a request without interpreting the status code.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failures or undecodable JSON.
    pub async fn send_raw(
        &self,
        request: &ApiRequest,
        authorization: Option<&str>,
    ) -> Result<RawResponse, GameError> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let text = response.text().await?;
        debug!("{} request to: {} ({})", request.method, request.url, status);

        let body = if is_json && !text.is_empty() {
            match serde_json::from_str(&text) {
                Ok(value) => ApiBody::Json(value),
                Err(_) if !(200..300).contains(&status) => ApiBody::Text(text),
                Err(e) => return Err(GameError::decode(&request.url, e)),
            }
        } else {
            ApiBody::Text(text)
        };

        Ok(RawResponse { status, body })
    }
}

/// Builds the reqwest proxy for an account binding.
fn build_proxy(config: &ProxyConfig) -> Result<Proxy, GameError> {
    let mut proxy = Proxy::all(config.url())
        .map_err(|e| GameError::ClientBuild(format!("Invalid proxy URL: {e}")))?;

    if let Some(username) = &config.username {
        proxy = proxy.basic_auth(username, config.password.as_deref().unwrap_or_default());
    }
    Ok(proxy)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client() -> GameHttpClient {
        GameHttpClient::new(Some("test-agent"), None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_json_and_text_bodies() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200).json_body(json!({"now": 5}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/text");
            then.status(200).header("content-type", "text/plain").body("OK");
        });

        let json = client().send(&ApiRequest::get(server.url("/json")), None).await.unwrap();
        assert_eq!(json, ApiBody::Json(json!({"now": 5})));

        let text = client().send(&ApiRequest::get(server.url("/text")), None).await.unwrap();
        assert_eq!(text, ApiBody::Text("OK".to_owned()));
    }

    #[tokio::test]
    async fn test_headers_and_bearer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/claim")
                .header("authorization", "Bearer abc")
                .header("user-agent", "test-agent")
                .header("cache-control", "no-cache")
                .header("origin", GAME_APP_URL)
                .json_body(json!({"gameId": "g", "points": 200}));
            then.status(200).json_body(json!({}));
        });

        let request = ApiRequest::post_json(server.url("/claim"), json!({"gameId": "g", "points": 200}));
        client().send(&request, Some("Bearer abc")).await.unwrap();
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/broken");
            then.status(500).body("boom");
        });

        let err = client().send(&ApiRequest::get(server.url("/broken")), None).await.unwrap_err();
        assert!(matches!(err, GameError::Status { status: 500, ref body } if body == "boom"));

        let raw = client().send_raw(&ApiRequest::get(server.url("/broken")), None).await.unwrap();
        assert_eq!(raw.status, 500);
        assert!(!raw.is_ok());
    }

    #[test]
    fn test_text_body_parses_on_demand() {
        #[derive(serde::Deserialize)]
        struct Now {
            now: i64,
        }
        let body = ApiBody::Text(r#"{"now": 7}"#.to_owned());
        assert_eq!(body.parse::<Now>("now").unwrap().now, 7);
        assert!(ApiBody::Text("nope".to_owned()).parse::<Now>("now").is_err());
    }

    #[test]
    fn test_proxy_with_credentials() {
        let proxy = ProxyConfig {
            scheme: "http".to_owned(),
            hostname: "127.0.0.1".to_owned(),
            port: 3128,
            username: Some("user".to_owned()),
            password: Some("pass".to_owned()),
        };
        assert!(GameHttpClient::new(None, Some(&proxy), Duration::from_secs(1)).is_ok());
    }
}

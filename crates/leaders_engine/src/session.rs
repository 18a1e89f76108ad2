use std::time::Duration;

use futures_util::StreamExt;
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use url::Url;

use crate::{FailureKind, HttpResponse, RequestError};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Upper bound on any response body, API or profile page. A larger body
    /// is a `TooLarge` failure, so an oversized profile page yields the
    /// "not found" sentinel rather than an unbounded download.
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("leaders-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Cookie set handed out by the API's cookie endpoint.
///
/// The content is opaque; only the `name=value` pairs are kept so they can be
/// sent back in a `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthToken {
    cookies: Vec<(String, String)>,
}

impl AuthToken {
    /// Builds a token from the cookies a response sets. Attributes such as
    /// `Path` or `HttpOnly` are dropped; a repeated name keeps the last value.
    pub fn from_response(response: &reqwest::Response) -> Self {
        let mut cookies: Vec<(String, String)> = Vec::new();
        for cookie in response.cookies() {
            let value = cookie.value().to_string();
            match cookies.iter_mut().find(|(existing, _)| existing == cookie.name()) {
                Some((_, slot)) => *slot = value,
                None => cookies.push((cookie.name().to_string(), value)),
            }
        }
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// `Cookie` header value, `None` when the set is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// One authenticated HTTP session against the leaders API.
///
/// The token is only attached to requests that share the API's origin, the way
/// a cookie jar scopes cookies; encyclopedia pages are fetched without it.
#[derive(Debug)]
pub struct SessionClient {
    client: reqwest::Client,
    base_url: Url,
    token: AuthToken,
    max_bytes: u64,
}

impl SessionClient {
    pub fn new(base_url: &str, settings: ClientSettings) -> Result<Self, RequestError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| RequestError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RequestError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as a base url"),
            ));
        }
        // Joining "countries" onto ".../api" would otherwise replace "api".
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| RequestError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: AuthToken::default(),
            max_bytes: settings.max_bytes,
        })
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Resolves an API endpoint such as `countries` against the base url.
    pub fn endpoint(&self, name: &str) -> Result<String, RequestError> {
        self.base_url
            .join(name)
            .map(String::from)
            .map_err(|err| RequestError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    /// Requests a fresh cookie set and replaces the current token with it.
    ///
    /// The token content is not validated: a non-success status is logged and
    /// whatever cookies came back are still stored.
    pub async fn authenticate(&mut self) -> Result<(), RequestError> {
        let url = self.endpoint("cookie")?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            harvest_warn!("Cookie endpoint answered {} for {}", status, url);
        }
        let token = AuthToken::from_response(&response);
        harvest_info!("Authenticated against {} ({} cookies)", self.base_url, token.len());
        self.token = token;
        Ok(())
    }

    /// Issues one GET with `params` appended to the query string.
    ///
    /// Never retries: deciding what a 403 means is left to the caller.
    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, RequestError> {
        let mut parsed = Url::parse(url)
            .map_err(|err| RequestError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !params.is_empty() {
            parsed.query_pairs_mut().extend_pairs(params);
        }

        let mut request = self.client.get(parsed.as_str());
        if parsed.origin() == self.base_url.origin() {
            if let Some(cookie) = self.token.header_value() {
                request = request.header(COOKIE, cookie);
            }
        }

        harvest_debug!("GET {}", parsed);
        let response = request.send().await.map_err(map_reqwest_error)?;
        self.read_response(response).await
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<HttpResponse, RequestError> {
        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(RequestError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(RequestError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            body,
            content_type,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return RequestError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    RequestError::new(FailureKind::Network, err.to_string())
}

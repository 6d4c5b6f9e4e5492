//! HTTP dispatch layer.
//!
//! Every request to a device goes through a [`Dispatch`]: a fresh, per-call
//! context holding the request, an optional [`Challenger`] and an optional
//! timeout. It sends the request over a [`Transport`], answers at most one
//! authentication challenge, and either decodes the JSON body into a bound
//! target ([`Dispatch::bind`]) or checks the status code ([`Dispatch::send`]).

mod challenge;
mod digest;
mod transport;

pub use challenge::{BasicAuth, Challenger};
pub use digest::DigestAuth;
pub(crate) use digest::sha256_hex;
pub use transport::HttpTransport;

use crate::error::{DispatchError, DispatchResult, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

/// An outgoing request whose body can be replayed.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request without body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request carrying `body` as JSON.
    pub fn post_json<T: Serialize + ?Sized>(url: Url, body: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self::new(Method::POST, url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(payload))
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Path component of the URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Path and query, as it appears on the request line.
    pub fn request_uri(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Set a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The HTTP transport requests are sent over.
///
/// Implementations read the whole body before returning so each attempt's
/// connection is released before the next one starts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. `timeout` overrides the transport default.
    async fn send(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError>;
}

/// A single dispatch: request plus resolved options.
///
/// Consumed by [`send`](Self::send) or [`bind`](Self::bind); never shared
/// between concurrent calls.
pub struct Dispatch<'a> {
    transport: &'a dyn Transport,
    request: HttpRequest,
    challenger: Option<&'a dyn Challenger>,
    timeout: Option<Duration>,
}

impl<'a> Dispatch<'a> {
    pub fn new(transport: &'a dyn Transport, request: HttpRequest) -> Self {
        Self {
            transport,
            request,
            challenger: None,
            timeout: None,
        }
    }

    /// Answer one authentication challenge with `challenger`.
    pub fn with_challenger(mut self, challenger: &'a dyn Challenger) -> Self {
        self.challenger = Some(challenger);
        self
    }

    /// Same as [`with_challenger`](Self::with_challenger), for devices that may not have one.
    pub fn with_optional_challenger(mut self, challenger: Option<&'a dyn Challenger>) -> Self {
        self.challenger = challenger;
        self
    }

    /// Override the transport's timeout for every attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Any status >= 400 is an error; otherwise the response is returned
    /// unread.
    pub async fn send(self) -> DispatchResult<HttpResponse> {
        let path = self.request.path().to_string();
        let response = self.exchange().await?;

        if response.status.as_u16() >= 400 {
            return Err(DispatchError::Unsuccessful {
                path,
                status: response.status.as_u16(),
                body: response.text(),
            });
        }
        Ok(response)
    }

    /// Decode the JSON body into `T`. The status code is not checked.
    pub async fn bind<T: DeserializeOwned>(self) -> DispatchResult<T> {
        let path = self.request.path().to_string();
        let response = self.exchange().await?;

        serde_json::from_slice(&response.body).map_err(|source| DispatchError::Decode { path, source })
    }

    async fn exchange(self) -> DispatchResult<HttpResponse> {
        let Dispatch {
            transport,
            request,
            challenger,
            timeout,
        } = self;

        let Some(challenger) = challenger else {
            return round_trip(transport, request, timeout).await;
        };

        let path = request.path().to_string();
        let replay = request.clone();
        trace!(method = %request.method, url = %request.url, "sending request");
        let response = transport.send(request, timeout).await?;

        if !challenger.challenge_accepted(&response) {
            return authorized(response, path);
        }

        debug!(path = %path, "answering authentication challenge");
        let answered = challenger.challenge_response(replay, &response)?;

        // Second and final attempt: no challenger, so a repeated 401 is terminal.
        round_trip(transport, answered, timeout).await
    }
}

async fn round_trip(
    transport: &dyn Transport,
    request: HttpRequest,
    timeout: Option<Duration>,
) -> DispatchResult<HttpResponse> {
    let path = request.path().to_string();
    trace!(method = %request.method, url = %request.url, "sending request");
    let response = transport.send(request, timeout).await?;
    authorized(response, path)
}

fn authorized(response: HttpResponse, path: String) -> DispatchResult<HttpResponse> {
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(DispatchError::Unauthorized { path });
    }
    Ok(response)
}

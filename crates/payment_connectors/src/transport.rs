//! Blocking HTTP transport behind a trait, so tests can substitute a
//! scripted gateway.

use std::time::Duration;

use error_stack::ResultExt;
use masking::Maskable;

use crate::{
    errors::{ConnectorError, CustomResult},
    response,
};

/// Connect timeout. Kept short so a gateway outage degrades caller
/// latency predictably instead of hanging a checkout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Overall timeout for one request/response exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
}

/// An already-encoded request body. Encoding happens at build time so
/// identical inputs produce byte-identical requests.
#[derive(Clone, PartialEq, Eq)]
pub enum RequestContent {
    FormUrlEncoded(String),
    Json(String),
}

impl RequestContent {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::FormUrlEncoded(_) => "application/x-www-form-urlencoded",
            Self::Json(_) => "application/json",
        }
    }

    pub fn into_body(self) -> String {
        match self {
            Self::FormUrlEncoded(body) | Self::Json(body) => body,
        }
    }
}

// Bodies carry card panes; only the shape is ever formatted.
impl std::fmt::Debug for RequestContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::FormUrlEncoded(_) => "FormUrlEncodedRequestBody",
            Self::Json(_) => "JsonRequestBody",
        })
    }
}

/// One outbound gateway request.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, Maskable<String>)>,
    pub body: Option<RequestContent>,
}

#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    url: String,
    headers: Vec<(String, Maskable<String>)>,
    body: Option<RequestContent>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: Maskable<String>) -> Self {
        self.headers.push((name.to_string(), value));
        self
    }

    pub fn set_body(mut self, body: RequestContent) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method.unwrap_or(Method::Post),
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// One raw gateway reply.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Synchronous request/response transport. Implementations must not
/// retry: a repeated merchant transaction code reads as a duplicate at
/// the gateway.
pub trait Transport {
    fn send(&self, request: Request) -> CustomResult<Response, ConnectorError>;
}

/// Production transport over a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> CustomResult<Self, ConnectorError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .change_context(ConnectorError::TransportFailure)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> CustomResult<Response, ConnectorError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value.into_inner());
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, body.content_type())
                .body(body.into_body());
        }

        let reply = builder
            .send()
            .change_context(ConnectorError::TransportFailure)?;

        let status_code = reply.status().as_u16();
        let content_type = reply
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = reply
            .text()
            .change_context(ConnectorError::TransportFailure)?;

        Ok(Response {
            status_code,
            content_type,
            body,
        })
    }
}

/// Reject replies whose content is an error page rather than the expected
/// protocol response. The extracted diagnostic goes to the operator log,
/// never to the customer.
pub fn ensure_protocol_response(reply: &Response) -> CustomResult<(), ConnectorError> {
    if response::is_html_document(reply.content_type.as_deref(), &reply.body) {
        let diagnostic = response::html_diagnostic(&reply.body)
            .unwrap_or_else(|| format!("HTTP {}", reply.status_code));
        tracing::warn!(status_code = reply.status_code, %diagnostic, "gateway returned an error page");
        return Err(ConnectorError::UnexpectedContentType.into());
    }
    Ok(())
}

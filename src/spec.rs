use crate::matcher::{match_request, BodyMatcher, MismatchReason, UrlPattern};
use crate::response::RawResponse;
use crate::serializable::MockRequest;
use http_client::Error;
use serde_json::Value;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Headers, status and body returned by a callback mock.
pub type CallbackResponse = (u16, Vec<(String, String)>, Vec<u8>);

/// Computes a response from the intercepted request, or fails it.
pub type Callback = Arc<dyn Fn(&MockRequest) -> Result<CallbackResponse, Error> + Send + Sync>;

/// Builds the error a mock raises. Called once per dispatch since errors are not `Clone`.
pub type ErrorFactory = Arc<dyn Fn() -> Error + Send + Sync>;

#[derive(Clone)]
pub enum MockBody {
    Text(String),
    Bytes(Vec<u8>),
    Error(ErrorFactory),
}

impl Debug for MockBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            MockBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            MockBody::Error(_) => f.write_str("Error(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentType {
    Default,
    Omitted,
    Explicit(String),
}

#[derive(Clone)]
enum Responder {
    Static {
        body: MockBody,
        status: u16,
        json: bool,
    },
    Callback(Callback),
}

/// One registered expectation: which requests it answers and how.
///
/// Two specs are equal when their method and URL (pattern source text for
/// regexes) are equal; everything else is ignored.
pub struct MockSpec {
    method: String,
    url: UrlPattern,
    match_querystring: Option<bool>,
    body_matchers: Vec<Arc<dyn BodyMatcher>>,
    content_type: ContentType,
    headers: Vec<(String, String)>,
    stream: bool,
    responder: Responder,
    call_count: AtomicUsize,
}

impl MockSpec {
    /// A static mock answering `200 OK` with an empty `text/plain` body.
    pub fn new(method: impl Display, url: impl Into<UrlPattern>) -> Self {
        Self::with_responder(
            method,
            url,
            Responder::Static {
                body: MockBody::Text(String::new()),
                status: 200,
                json: false,
            },
        )
    }

    /// A mock whose response is computed by `callback` on every dispatch.
    pub fn callback<F>(method: impl Display, url: impl Into<UrlPattern>, callback: F) -> Self
    where
        F: Fn(&MockRequest) -> Result<CallbackResponse, Error> + Send + Sync + 'static,
    {
        Self::with_responder(method, url, Responder::Callback(Arc::new(callback)))
    }

    fn with_responder(method: impl Display, url: impl Into<UrlPattern>, responder: Responder) -> Self {
        Self {
            method: method.to_string(),
            url: url.into().with_default_path(),
            match_querystring: None,
            body_matchers: Vec::new(),
            content_type: ContentType::Default,
            headers: Vec::new(),
            stream: false,
            responder,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Static mocks only; a callback mock logs a warning and keeps its callback.
    pub fn body(self, body: impl Into<String>) -> Self {
        self.set_body(MockBody::Text(body.into()), false)
    }

    pub fn body_bytes(self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(MockBody::Bytes(body.into()), false)
    }

    /// Serialize `value` as the body; the content type becomes `application/json`
    /// unless one was set explicitly. Static mocks only.
    pub fn json(self, value: Value) -> Self {
        self.set_body(MockBody::Text(value.to_string()), true)
    }

    /// Fail every matching request with the error built by `factory`.
    /// Static mocks only; a callback fails a request by returning `Err`.
    pub fn error<F>(self, factory: F) -> Self
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        self.set_body(MockBody::Error(Arc::new(factory)), false)
    }

    fn set_body(mut self, new_body: MockBody, is_json: bool) -> Self {
        if let Responder::Static { body, json, .. } = &mut self.responder {
            *body = new_body;
            *json = is_json;
        } else {
            self.warn_ignored("body");
        }
        self
    }

    /// Static mocks only; a callback returns its own status.
    pub fn status(mut self, code: u16) -> Self {
        if let Responder::Static { status, .. } = &mut self.responder {
            *status = code;
        } else {
            self.warn_ignored("status");
        }
        self
    }

    fn warn_ignored(&self, setting: &str) {
        log::warn!(
            "Ignoring {setting} on callback mock {} {}; the callback decides it",
            self.method,
            self.url
        );
    }

    /// Add a response header. Repeated names are kept, in order.
    ///
    /// On a callback mock, headers the callback returns replace declared
    /// headers of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = ContentType::Explicit(content_type.into());
        self
    }

    /// Send no `Content-Type` header at all.
    pub fn no_content_type(mut self) -> Self {
        self.content_type = ContentType::Omitted;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Override query-string inference (see [`MockSpec::match_querystring`]).
    pub fn match_querystring(mut self, match_querystring: bool) -> Self {
        self.match_querystring = Some(match_querystring);
        self
    }

    pub fn body_matcher(mut self, matcher: impl BodyMatcher + 'static) -> Self {
        self.body_matchers.push(Arc::new(matcher));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &UrlPattern {
        &self.url
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.responder, Responder::Callback(_))
    }

    /// Whether the query string takes part in URL matching.
    ///
    /// When not set explicitly: patterns never match on the query, literal
    /// URLs do exactly when they contain a query string themselves.
    pub fn should_match_querystring(&self) -> bool {
        self.match_querystring.unwrap_or_else(|| self.url.has_query())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub(crate) fn record_call(&self) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
    }

    /// The `Content-Type` this mock declares, if any.
    pub fn declared_content_type(&self) -> Option<String> {
        match &self.content_type {
            ContentType::Explicit(content_type) => Some(content_type.clone()),
            ContentType::Omitted => None,
            ContentType::Default => Some(
                match &self.responder {
                    Responder::Static { json: true, .. } => "application/json",
                    Responder::Static {
                        body: MockBody::Text(text),
                        ..
                    } if !text.is_ascii() => "text/plain; charset=utf-8",
                    _ => "text/plain",
                }
                .to_string(),
            ),
        }
    }

    /// Check this mock against a request; the error names the first stage that failed.
    pub fn matches(&self, request: &MockRequest) -> Result<(), MismatchReason> {
        match_request(
            &self.method,
            &self.url,
            self.should_match_querystring(),
            &self.body_matchers,
            request,
        )
    }

    fn declared_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(content_type) = self.declared_content_type() {
            headers.push(("Content-Type".to_string(), content_type));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }

    /// Produce the response for a request this mock was selected for.
    pub fn materialize(&self, request: &MockRequest) -> Result<RawResponse, Error> {
        match &self.responder {
            Responder::Static { body, status, .. } => {
                let body = match body {
                    MockBody::Error(factory) => return Err(factory()),
                    MockBody::Text(text) => text.clone().into_bytes(),
                    MockBody::Bytes(bytes) => bytes.clone(),
                };
                Ok(RawResponse {
                    status: *status,
                    headers: self.declared_headers(),
                    body,
                    stream: self.stream,
                })
            }
            Responder::Callback(callback) => {
                let (status, callback_headers, body) = callback(request)?;

                let mut headers = self.declared_headers();
                headers.retain(|(declared, _)| {
                    !callback_headers
                        .iter()
                        .any(|(name, _)| name.eq_ignore_ascii_case(declared))
                });
                headers.extend(callback_headers);

                Ok(RawResponse {
                    status,
                    headers,
                    body,
                    stream: self.stream,
                })
            }
        }
    }
}

impl Clone for MockSpec {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            match_querystring: self.match_querystring,
            body_matchers: self.body_matchers.clone(),
            content_type: self.content_type.clone(),
            headers: self.headers.clone(),
            stream: self.stream,
            responder: self.responder.clone(),
            call_count: AtomicUsize::new(self.call_count()),
        }
    }
}

impl PartialEq for MockSpec {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.url == other.url
    }
}

impl Debug for MockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("MockSpec");
        out.field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("match_querystring", &self.should_match_querystring())
            .field("content_type", &self.declared_content_type())
            .field("headers", &self.headers)
            .field("stream", &self.stream)
            .field("call_count", &self.call_count());
        match &self.responder {
            Responder::Static { body, status, .. } => {
                out.field("status", status).field("body", body)
            }
            Responder::Callback(_) => out.field("callback", &".."),
        };
        out.finish()
    }
}

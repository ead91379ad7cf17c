use crate::serializable::SerializableResponse;
use http_client::{Error, Response};
use http_types::headers::{HeaderName, CONTENT_TYPE};
use http_types::{Body, StatusCode};
use std::str::FromStr;

/// A synthesized response before it is turned into an `http_types::Response`.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Header pairs in declaration order. Duplicate names are allowed.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Streaming responses are handed back without reading the body first.
    pub stream: bool,
}

impl RawResponse {
    /// Snapshot for the call log. A streaming body is left out.
    pub fn snapshot(&self) -> SerializableResponse {
        SerializableResponse {
            status: self.status,
            reason: reason_phrase(self.status).to_string(),
            headers: self.headers.clone(),
            body: if self.stream {
                None
            } else {
                Some(self.body.clone())
            },
        }
    }

    /// Build the response handed to the caller.
    ///
    /// Header names and values the transport cannot carry fail the call
    /// instead of being dropped. Without a declared `Content-Type` the
    /// response carries none.
    pub fn into_response(self) -> Result<Response, Error> {
        let status = StatusCode::try_from(self.status)
            .map_err(|e| Error::from_str(500, format!("Invalid mock status {}: {e}", self.status)))?;

        let mut response = Response::new(status);
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_str(name)
                .map_err(|e| Error::from_str(500, format!("Invalid mock header name {name:?}: {e}")))?;
            response
                .append_header(header_name, value.as_str())
                .map_err(|e| {
                    Error::from_str(500, format!("Invalid value for mock header {name}: {e}"))
                })?;
        }
        set_body_keeping_content_type(&mut response, self.body);
        response.ext_mut().insert(OriginalResponseShim::new(
            status.canonical_reason(),
            self.headers,
        ));

        Ok(response)
    }
}

/// Replace the body without letting it imply a `Content-Type` the mock never declared.
pub(crate) fn set_body_keeping_content_type(response: &mut Response, body: impl Into<Body>) {
    let declared = response.header(CONTENT_TYPE).is_some();
    response.set_body(body);
    if !declared {
        response.remove_header(CONTENT_TYPE);
    }
}

/// Reason phrase for a status code, empty for codes outside the standard table.
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::try_from(status)
        .map(|status| status.canonical_reason())
        .unwrap_or("")
}

/// Stand-in for the connection-level response a real transport would keep.
///
/// Attached to every mocked response as an extension so downstream code can
/// extract headers and cookies the way it would from a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalResponseShim {
    reason: &'static str,
    headers: Vec<(String, String)>,
}

impl OriginalResponseShim {
    pub fn new(reason: &'static str, headers: Vec<(String, String)>) -> Self {
        Self { reason, headers }
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Name/value pairs of every `Set-Cookie` header.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, value)| {
                let pair = value.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// The mocked connection is always finished.
    pub fn is_closed(&self) -> bool {
        true
    }

    /// Closing early means the body was cut short.
    pub fn close(&self) -> Result<(), Error> {
        Err(Error::from_str(
            500,
            "Connection broken: Incomplete Read, Content-length mismatch with body",
        ))
    }
}

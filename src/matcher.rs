use crate::form_data::parse_form_data;
use crate::serializable::MockRequest;
use crate::utils::{clean_unicode, ensure_default_path, has_unicode, query_of};
use regex::Regex;
use serde_json::Value;
use std::fmt::{self, Debug, Display};
use url::{Position, Url};

/// The URL a mock answers: a literal string or a compiled pattern.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Literal(String),
    Regex(Regex),
}

impl UrlPattern {
    /// Literal URLs without a path get the path `/`. Patterns are kept as-is.
    pub fn with_default_path(self) -> Self {
        match self {
            UrlPattern::Literal(url) => UrlPattern::Literal(ensure_default_path(&url)),
            pattern => pattern,
        }
    }

    /// The literal URL, or the source text of the pattern.
    pub fn as_str(&self) -> &str {
        match self {
            UrlPattern::Literal(url) => url,
            UrlPattern::Regex(regex) => regex.as_str(),
        }
    }

    pub fn has_query(&self) -> bool {
        match self {
            UrlPattern::Literal(url) => !query_of(url).is_empty(),
            UrlPattern::Regex(_) => false,
        }
    }

    /// Does `request_url` satisfy this pattern.
    ///
    /// Literal URLs compare scheme, host and path exactly. With
    /// `match_querystring` the query parameters must also be the same
    /// multiset; without it the query is ignored.
    pub fn matches(&self, request_url: &str, match_querystring: bool) -> bool {
        match self {
            UrlPattern::Regex(regex) => regex.is_match(request_url),
            UrlPattern::Literal(url) => {
                let url = if has_unicode(url) {
                    clean_unicode(url)
                } else {
                    url.clone()
                };
                if match_querystring {
                    url_matches_strict(&url, request_url)
                } else {
                    base_of(&url) == base_of(request_url)
                }
            }
        }
    }

    /// Passthrough test: literal prefixes use `starts_with`, patterns `is_match`.
    pub fn is_prefix_of(&self, request_url: &str) -> bool {
        match self {
            UrlPattern::Literal(prefix) => request_url.starts_with(prefix.as_str()),
            UrlPattern::Regex(regex) => regex.is_match(request_url),
        }
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for UrlPattern {
    fn from(url: &str) -> Self {
        UrlPattern::Literal(url.to_string())
    }
}

impl From<String> for UrlPattern {
    fn from(url: String) -> Self {
        UrlPattern::Literal(url)
    }
}

impl From<&String> for UrlPattern {
    fn from(url: &String) -> Self {
        UrlPattern::Literal(url.clone())
    }
}

impl From<Regex> for UrlPattern {
    fn from(regex: Regex) -> Self {
        UrlPattern::Regex(regex)
    }
}

impl From<&Regex> for UrlPattern {
    fn from(regex: &Regex) -> Self {
        UrlPattern::Regex(regex.clone())
    }
}

/// Everything before the query, with percent-encoding normalized.
fn base_of(url: &str) -> String {
    let without_qs = url.split('?').next().unwrap_or(url);
    match Url::parse(without_qs) {
        Ok(parsed) => parsed[..Position::AfterPath].to_string(),
        Err(_) => without_qs.to_string(),
    }
}

fn url_matches_strict(url: &str, other: &str) -> bool {
    match (Url::parse(url), Url::parse(other)) {
        (Ok(url), Ok(other)) => {
            url[..Position::AfterPath] == other[..Position::AfterPath]
                && parse_form_data(url.query().unwrap_or(""))
                    == parse_form_data(other.query().unwrap_or(""))
        }
        _ => url == other,
    }
}

/// The stage at which a mock rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    Method,
    Url,
    Body,
}

impl Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MismatchReason::Method => "Method does not match",
            MismatchReason::Url => "URL does not match",
            MismatchReason::Body => "Parameters do not match",
        })
    }
}

/// Run the method, URL and body checks of one mock against a request.
pub fn match_request(
    method: &str,
    url: &UrlPattern,
    match_querystring: bool,
    body_matchers: &[std::sync::Arc<dyn BodyMatcher>],
    request: &MockRequest,
) -> Result<(), MismatchReason> {
    log::debug!(
        "Matching request: {} {} against mock: {} {}",
        request.method,
        request.url,
        method,
        url
    );

    if request.method != method {
        log::debug!("Method mismatch: {} != {}", request.method, method);
        return Err(MismatchReason::Method);
    }

    if !url.matches(&request.url, match_querystring) {
        log::debug!(
            "URL mismatch: {} != {} (match_querystring={})",
            request.url,
            url,
            match_querystring
        );
        return Err(MismatchReason::Url);
    }

    let body = request.body.as_deref();
    if let Some(failed) = body_matchers.iter().find(|m| !m.matches(body)) {
        log::debug!("Body matcher rejected request: {failed:?}");
        return Err(MismatchReason::Body);
    }

    Ok(())
}

/// A predicate over the raw request body. `None` means the request had no body.
pub trait BodyMatcher: Debug + Send + Sync {
    fn matches(&self, body: Option<&[u8]>) -> bool;
}

/// Matches a form-encoded body against an expected set of parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlencodedParamsMatcher {
    expected: Option<Vec<(String, String)>>,
}

impl UrlencodedParamsMatcher {
    /// Matches only requests that carry no body at all.
    pub fn no_body() -> Self {
        Self { expected: None }
    }
}

impl BodyMatcher for UrlencodedParamsMatcher {
    fn matches(&self, body: Option<&[u8]>) -> bool {
        match (body, &self.expected) {
            (None, expected) => expected.is_none(),
            (Some(_), None) => false,
            (Some(body), Some(expected)) => {
                parse_form_data(&String::from_utf8_lossy(body)) == *expected
            }
        }
    }
}

/// Build a matcher comparing the form-decoded body with `params`, ignoring order.
pub fn urlencoded_params_matcher<I, K, V>(params: I) -> UrlencodedParamsMatcher
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut expected: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    expected.sort();
    UrlencodedParamsMatcher {
        expected: Some(expected),
    }
}

/// Matches a JSON body that deep-equals the expected value.
///
/// `Value::Null` stands for "no body", and also matches a literal `null` body.
/// A body that fails to decode never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonParamsMatcher {
    expected: Value,
}

impl BodyMatcher for JsonParamsMatcher {
    fn matches(&self, body: Option<&[u8]>) -> bool {
        match body {
            None => self.expected.is_null(),
            Some(body) => match serde_json::from_slice::<Value>(body) {
                Ok(actual) => actual == self.expected,
                Err(e) => {
                    log::debug!("Request body is not JSON: {e}");
                    false
                }
            },
        }
    }
}

pub fn json_params_matcher(expected: Value) -> JsonParamsMatcher {
    JsonParamsMatcher { expected }
}

/// Adapts a closure into a [`BodyMatcher`].
pub struct FnBodyMatcher<F> {
    name: String,
    predicate: F,
}

impl<F> FnBodyMatcher<F>
where
    F: Fn(Option<&[u8]>) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> Debug for FnBodyMatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBodyMatcher")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> BodyMatcher for FnBodyMatcher<F>
where
    F: Fn(Option<&[u8]>) -> bool + Send + Sync,
{
    fn matches(&self, body: Option<&[u8]>) -> bool {
        (self.predicate)(body)
    }
}

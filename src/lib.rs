use http_client::{Error, HttpClient, Response};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use crate::transport::RefusingClient;

mod calls;
mod error;
mod form_data;
mod matcher;
mod registry;
mod response;
mod serializable;
mod spec;
mod transport;
mod utils;

pub use calls::{CallList, CallRecord};
pub use error::{MatchReport, MockError, Result};
pub use form_data::{parse_form_data, parse_qsl};
pub use matcher::{
    json_params_matcher, urlencoded_params_matcher, BodyMatcher, FnBodyMatcher,
    JsonParamsMatcher, MismatchReason, UrlPattern, UrlencodedParamsMatcher,
};
pub use registry::{FoundMatch, Registry};
pub use response::{reason_phrase, OriginalResponseShim, RawResponse};
pub use serializable::{CallOutcome, MockRequest, ParamValue, RequestParams, SerializableResponse};
pub use spec::{Callback, CallbackResponse, ErrorFactory, MockBody, MockSpec};
pub use transport::MockTransport;
pub use utils::{clean_unicode, comparison_url, ensure_default_path, parse_request_params};

pub const DELETE: &str = "DELETE";
pub const GET: &str = "GET";
pub const HEAD: &str = "HEAD";
pub const OPTIONS: &str = "OPTIONS";
pub const PATCH: &str = "PATCH";
pub const POST: &str = "POST";
pub const PUT: &str = "PUT";

/// Applied to every dispatch outcome before it reaches the caller.
pub type ResponseCallback =
    Arc<dyn Fn(std::result::Result<Response, Error>) -> std::result::Result<Response, Error> + Send + Sync>;

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) registry: Registry,
    pub(crate) calls: CallList,
    pub(crate) passthru_prefixes: Vec<UrlPattern>,
    pub(crate) active: bool,
    pub(crate) assert_all_requests_are_fired: bool,
}

pub(crate) struct Shared {
    state: Mutex<SessionState>,
    response_callback: Option<ResponseCallback>,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state().active
    }

    pub(crate) fn respond(
        &self,
        outcome: std::result::Result<Response, Error>,
    ) -> std::result::Result<Response, Error> {
        match &self.response_callback {
            Some(callback) => callback(outcome),
            None => outcome,
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("state", &*self.state())
            .field("response_callback", &self.response_callback.is_some())
            .finish()
    }
}

/// A mocking session: the registered mocks, the call log and the switch
/// that turns interception on and off for every transport bound to it.
///
/// Sessions are independent of one another; cloning a `RequestsMock` yields
/// another handle to the same session.
#[derive(Debug, Clone)]
pub struct RequestsMock {
    shared: Arc<Shared>,
}

impl RequestsMock {
    pub fn new() -> Self {
        RequestsMockBuilder::new().build()
    }

    pub fn builder() -> RequestsMockBuilder {
        RequestsMockBuilder::new()
    }

    /// An interception hook forwarding unintercepted traffic to `inner`.
    pub fn transport(&self, inner: Box<dyn HttpClient>) -> MockTransport {
        MockTransport::new(Arc::clone(&self.shared), inner)
    }

    /// An interception hook that can never reach the network.
    pub fn client(&self) -> MockTransport {
        self.transport(Box::new(RefusingClient::new()))
    }

    pub fn add(&self, spec: MockSpec) {
        self.shared.state().registry.add(spec);
    }

    pub fn add_callback<F>(&self, method: impl std::fmt::Display, url: impl Into<UrlPattern>, callback: F)
    where
        F: Fn(&MockRequest) -> std::result::Result<CallbackResponse, Error> + Send + Sync + 'static,
    {
        self.add(MockSpec::callback(method, url, callback));
    }

    /// Let unmatched requests whose URL starts with (or, for a pattern,
    /// matches) `prefix` through to the inner client.
    pub fn add_passthru(&self, prefix: impl Into<UrlPattern>) {
        let prefix = match prefix.into() {
            UrlPattern::Literal(prefix) => UrlPattern::Literal(clean_unicode(&prefix)),
            pattern => pattern,
        };
        log::debug!("Adding passthrough prefix {prefix}");
        self.shared.state().passthru_prefixes.push(prefix);
    }

    pub fn passthru_prefixes(&self) -> Vec<UrlPattern> {
        self.shared.state().passthru_prefixes.clone()
    }

    /// Remove every mock registered for `method` and `url`.
    pub fn remove(&self, method: impl std::fmt::Display, url: impl Into<UrlPattern>) -> usize {
        self.remove_spec(&MockSpec::new(method, url))
    }

    /// Remove every mock equal to `spec`.
    pub fn remove_spec(&self, spec: &MockSpec) -> usize {
        self.shared.state().registry.remove(spec)
    }

    /// Replace the first mock with the same method and URL as `spec`.
    pub fn replace(&self, spec: MockSpec) -> Result<()> {
        self.shared.state().registry.replace(spec)
    }

    pub fn upsert(&self, spec: MockSpec) {
        self.shared.state().registry.upsert(spec);
    }

    /// The registered mocks in match order.
    pub fn registered(&self) -> Vec<Arc<MockSpec>> {
        self.shared.state().registry.registered()
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> CallList {
        self.shared.state().calls.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn assert_all_requests_are_fired(&self) -> bool {
        self.shared.state().assert_all_requests_are_fired
    }

    pub fn set_assert_all_requests_are_fired(&self, enabled: bool) {
        self.shared.state().assert_all_requests_are_fired = enabled;
    }

    /// Forget all mocks and calls. Passthrough prefixes are kept.
    pub fn reset(&self) {
        let mut state = self.shared.state();
        state.registry.clear();
        state.calls.reset();
    }

    /// Install the interception hook on every bound transport.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.state();
        if state.active {
            return Err(MockError::AlreadyActive);
        }
        state.active = true;
        log::debug!("Mock session started with {} mock(s)", state.registry.len());
        Ok(())
    }

    /// Remove the interception hook.
    ///
    /// With `allow_assert` and `assert_all_requests_are_fired` both set, fails
    /// when any registered mock was never called.
    pub fn stop(&self, allow_assert: bool) -> Result<()> {
        let mut state = self.shared.state();
        if !state.active {
            return Err(MockError::NotActive);
        }
        state.active = false;
        log::debug!("Mock session stopped after {} call(s)", state.calls.len());

        if !state.assert_all_requests_are_fired || !allow_assert {
            return Ok(());
        }

        let unfired: Vec<(String, String)> = state
            .registry
            .unfired()
            .iter()
            .map(|spec| (spec.method().to_string(), spec.url().to_string()))
            .collect();
        if unfired.is_empty() {
            Ok(())
        } else {
            Err(MockError::UnfulfilledExpectations { unfired })
        }
    }

    /// Check that `url` was requested exactly `expected` times.
    pub fn assert_call_count(&self, url: &str, expected: usize) -> Result<()> {
        let actual = self
            .shared
            .state()
            .calls
            .count_for_url(&comparison_url(url));
        if actual == expected {
            Ok(())
        } else {
            Err(MockError::CallCountMismatch {
                url: url.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Start the session for a scope. See [`MockGuard`].
    pub fn enter(&self) -> Result<MockGuard<'_>> {
        self.start()?;
        Ok(MockGuard {
            mock: self,
            finished: false,
        })
    }

    /// Run the future built by `f` with the session active.
    ///
    /// The session is stopped and reset afterwards. The all-fired assertion
    /// only runs when `f` succeeded; its failure is then returned instead.
    pub async fn activate<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<MockError>,
    {
        let guard = self.enter()?;
        match f().await {
            Ok(value) => {
                guard.finish()?;
                Ok(value)
            }
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }
}

impl Default for RequestsMock {
    fn default() -> Self {
        Self::new()
    }
}

/// Session configuration.
#[derive(Default)]
pub struct RequestsMockBuilder {
    assert_all_requests_are_fired: Option<bool>,
    passthru_prefixes: Vec<UrlPattern>,
    response_callback: Option<ResponseCallback>,
}

impl RequestsMockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `stop` when a registered mock was never called. Defaults to true.
    pub fn assert_all_requests_are_fired(mut self, enabled: bool) -> Self {
        self.assert_all_requests_are_fired = Some(enabled);
        self
    }

    pub fn passthru_prefix(mut self, prefix: impl Into<UrlPattern>) -> Self {
        self.passthru_prefixes.push(prefix.into());
        self
    }

    pub fn response_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(std::result::Result<Response, Error>) -> std::result::Result<Response, Error>
            + Send
            + Sync
            + 'static,
    {
        self.response_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> RequestsMock {
        let state = SessionState {
            assert_all_requests_are_fired: self.assert_all_requests_are_fired.unwrap_or(true),
            ..SessionState::default()
        };
        let mock = RequestsMock {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                response_callback: self.response_callback,
            }),
        };
        for prefix in self.passthru_prefixes {
            mock.add_passthru(prefix);
        }
        mock
    }
}

impl std::fmt::Debug for RequestsMockBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestsMockBuilder")
            .field(
                "assert_all_requests_are_fired",
                &self.assert_all_requests_are_fired,
            )
            .field("passthru_prefixes", &self.passthru_prefixes)
            .field("response_callback", &self.response_callback.is_some())
            .finish()
    }
}

/// An active session scope.
///
/// [`MockGuard::finish`] stops the session with the all-fired assertion.
/// Dropping the guard unfinished, e.g. when the scope is left through `?` or
/// a panic, stops it without asserting. The session is reset either way.
#[derive(Debug)]
#[must_use = "dropping the guard immediately stops the session"]
pub struct MockGuard<'a> {
    mock: &'a RequestsMock,
    finished: bool,
}

impl MockGuard<'_> {
    pub fn mock(&self) -> &RequestsMock {
        self.mock
    }

    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let stopped = self.mock.stop(true);
        self.mock.reset();
        stopped
    }
}

impl Drop for MockGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.mock.stop(false) {
            log::debug!("Mock scope closed on an inactive session: {e}");
        }
        self.mock.reset();
    }
}

/// The process-wide convenience session.
///
/// It does not assert that all mocks fired. Tests running in parallel should
/// construct their own [`RequestsMock`] instead.
pub fn default_mock() -> &'static RequestsMock {
    static DEFAULT: OnceLock<RequestsMock> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        RequestsMock::builder()
            .assert_all_requests_are_fired(false)
            .build()
    })
}

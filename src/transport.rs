use crate::error::MockError;
use crate::response::set_body_keeping_content_type;
use crate::serializable::{CallOutcome, MockRequest};
use crate::Shared;
use async_trait::async_trait;
use http_client::{Config, Error, HttpClient, Request, Response};
use http_types::StatusCode;
use std::sync::Arc;

/// The interception hook: an `HttpClient` bound to a [`RequestsMock`](crate::RequestsMock).
///
/// While its session is active every request is resolved against the
/// registered mocks. While inactive, and for passthrough URLs, requests go
/// to the inner client unchanged.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Shared>,
    inner: Box<dyn HttpClient>,
}

impl MockTransport {
    pub(crate) fn new(shared: Arc<Shared>, inner: Box<dyn HttpClient>) -> Self {
        Self { shared, inner }
    }

    /// Resolve one intercepted request to a mocked response or error.
    async fn on_request(&self, mut req: Request) -> Result<Response, Error> {
        let request = MockRequest::from_request(&mut req).await?;

        let (found, passthrough) = {
            let mut state = self.shared.state();
            let found = state.registry.find_match(&request);
            let passthrough = found.spec.is_none()
                && state
                    .passthru_prefixes
                    .iter()
                    .any(|prefix| prefix.is_prefix_of(&request.url));
            (found, passthrough)
        };

        let Some(spec) = found.spec else {
            if passthrough {
                log::info!("request.allowed-passthru url={}", request.url);
                return self.inner.send(req).await;
            }

            let refusal = MockError::ConnectionRefused {
                method: request.method.clone(),
                url: request.url.clone(),
                reports: found.reports,
            };
            log::warn!("Refusing unmatched request {} {}", request.method, request.url);
            let error = Error::new(StatusCode::NotFound, refusal);
            self.shared
                .state()
                .calls
                .add(request, CallOutcome::from_error(&error));
            return self.shared.respond(Err(error));
        };

        let materialized = spec
            .materialize(&request)
            .and_then(|raw| Ok((raw.snapshot(), raw.into_response()?)));

        let (snapshot, mut response) = match materialized {
            Ok(parts) => parts,
            Err(error) => {
                log::debug!(
                    "Mock {} {} raised an error: {error}",
                    spec.method(),
                    spec.url()
                );
                spec.record_call();
                self.shared
                    .state()
                    .calls
                    .add(request, CallOutcome::from_error(&error));
                return self.shared.respond(Err(error));
            }
        };

        if !spec.is_stream() {
            let body = response.take_body().into_bytes().await?;
            set_body_keeping_content_type(&mut response, body);
        }

        spec.record_call();
        log::debug!(
            "Mock {} {} answered with status {}",
            spec.method(),
            spec.url(),
            snapshot.status
        );
        self.shared
            .state()
            .calls
            .add(request, CallOutcome::Response(snapshot));
        self.shared.respond(Ok(response))
    }
}

#[async_trait]
impl HttpClient for MockTransport {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        if !self.shared.is_active() {
            return self.inner.send(req).await;
        }
        self.on_request(req).await
    }

    fn set_config(&mut self, config: Config) -> Result<(), Error> {
        self.inner
            .set_config(config)
            .map_err(|e| Error::from_str(500, format!("Config error: {e}")))
    }

    fn config(&self) -> &Config {
        self.inner.config()
    }
}

/// Inner client of [`RequestsMock::client`](crate::RequestsMock::client).
///
/// Whatever reaches it would otherwise have gone to the network.
#[derive(Debug)]
pub(crate) struct RefusingClient {
    config: Config,
}

impl RefusingClient {
    pub(crate) fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }
}

#[async_trait]
impl HttpClient for RefusingClient {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        log::warn!("Blocked real request {} {}", req.method(), req.url());
        Err(Error::from_str(
            StatusCode::ServiceUnavailable,
            format!(
                "Real HTTP request {} {} blocked: the mock session is inactive or the URL \
                 is passthrough, and this transport has no real client",
                req.method(),
                req.url()
            ),
        ))
    }

    fn set_config(&mut self, config: Config) -> Result<(), Error> {
        self.config = config;
        Ok(())
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

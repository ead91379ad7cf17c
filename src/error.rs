//! Error types for mocked transports and sessions

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, MockError>;

/// Why a single registered mock did not answer a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub method: String,
    pub url: String,
    pub reason: String,
}

/// Errors raised by the mock engine
#[derive(Debug, Error)]
pub enum MockError {
    /// No registered mock matched and no passthrough prefix applied
    #[error(
        "Connection refused by mock transport - the call doesn't match any registered mock.\n\n\
         Request: \n- {} {}\n\nAvailable matches:\n{}",
        .method,
        .url,
        render_reports(.reports)
    )]
    ConnectionRefused {
        method: String,
        url: String,
        reports: Vec<MatchReport>,
    },

    /// Teardown found mocks that were never called
    #[error("Not all requests have been executed {}", render_unfired(.unfired))]
    UnfulfilledExpectations {
        /// (method, url) of every mock with a zero call count
        unfired: Vec<(String, String)>,
    },

    /// `replace` found nothing equal to the given mock
    #[error("Response is not registered for URL {url}")]
    NotRegistered { method: String, url: String },

    /// `assert_call_count` observed a different number of calls
    #[error("Expected URL '{url}' to be called {expected} times. Called {actual} times.")]
    CallCountMismatch {
        url: String,
        expected: usize,
        actual: usize,
    },

    #[error("Mock session is already active")]
    AlreadyActive,

    #[error("Mock session is not active")]
    NotActive,
}

fn render_reports(reports: &[MatchReport]) -> String {
    reports
        .iter()
        .map(|r| format!("- {} {} {}\n", r.method, r.url, r.reason))
        .collect()
}

fn render_unfired(unfired: &[(String, String)]) -> String {
    let items: Vec<String> = unfired
        .iter()
        .map(|(method, url)| format!("('{method}', '{url}')"))
        .collect();
    format!("[{}]", items.join(", "))
}

mod common;

use common::{get_text, send, StubNetwork};
use http_client::{Error, HttpClient};
use http_client_responses::{default_mock, MockError, MockSpec, RequestsMock, GET};
use http_types::Method;
use regex::Regex;

#[tokio::test]
async fn test_inactive_session_forwards_to_inner_client() -> Result<(), Box<dyn std::error::Error>> {
    let network = StubNetwork::default();
    let mock = RequestsMock::new();
    let client = mock.transport(Box::new(network.clone()));
    mock.add(MockSpec::new(GET, "http://example.com/").body("mocked"));

    assert_eq!(
        get_text(&client, "http://example.com/").await?,
        "real:http://example.com/"
    );

    mock.start()?;
    assert_eq!(get_text(&client, "http://example.com/").await?, "mocked");
    mock.stop(true)?;

    assert_eq!(network.urls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mock = RequestsMock::new();
    mock.start().unwrap();
    assert!(matches!(mock.start(), Err(MockError::AlreadyActive)));
    mock.stop(false).unwrap();
    assert!(matches!(mock.stop(false), Err(MockError::NotActive)));
}

#[tokio::test]
async fn test_passthrough_prefixes() -> Result<(), Box<dyn std::error::Error>> {
    let network = StubNetwork::default();
    let mock = RequestsMock::builder()
        .passthru_prefix("http://real.example.com/")
        .build();
    mock.add_passthru(Regex::new(r"^https://api\.\w+\.org/")?);
    let client = mock.transport(Box::new(network.clone()));

    let guard = mock.enter()?;
    assert_eq!(
        get_text(&client, "http://real.example.com/page?x=1").await?,
        "real:http://real.example.com/page?x=1"
    );
    assert_eq!(
        get_text(&client, "https://api.service.org/v1").await?,
        "real:https://api.service.org/v1"
    );
    assert!(send(&client, Method::Get, "http://elsewhere.com/").await.is_err());

    let seen = network.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    let params = seen[0].1.as_ref().expect("params slot populated");
    assert_eq!(params.0.get("x").and_then(|v| v.as_single()), Some("1"));

    // Passthrough calls bypass the call log; the refused one is recorded.
    assert_eq!(mock.calls().len(), 1);
    drop(guard);
    Ok(())
}

#[tokio::test]
async fn test_unicode_passthrough_prefix_is_cleaned() {
    let mock = RequestsMock::new();
    mock.add_passthru("http://münchen.de/");
    assert_eq!(
        mock.passthru_prefixes()[0].as_str(),
        "http://xn--mnchen-3ya.de/"
    );
}

#[tokio::test]
async fn test_unfired_mock_fails_clean_exit() -> Result<(), Box<dyn std::error::Error>> {
    let mock = RequestsMock::new();
    let client = mock.client();
    mock.add(MockSpec::new(GET, "http://example.com/used"));
    mock.add(MockSpec::new(GET, "http://example.com/unused"));

    let guard = mock.enter()?;
    send(&client, Method::Get, "http://example.com/used").await?;
    let err = guard.finish().unwrap_err();
    match err {
        MockError::UnfulfilledExpectations { unfired } => {
            assert_eq!(
                unfired,
                vec![("GET".to_string(), "http://example.com/unused".to_string())]
            );
        }
        other => panic!("unexpected error {other}"),
    }

    // The scope reset the session even though it failed.
    assert!(mock.registered().is_empty());
    assert!(mock.calls().is_empty());
    assert!(!mock.is_active());
    Ok(())
}

#[tokio::test]
async fn test_failed_scope_skips_assertion() {
    let mock = RequestsMock::new();
    mock.add(MockSpec::new(GET, "http://example.com/never"));

    let outcome: Result<(), Error> = mock
        .activate(|| async { Err(Error::from_str(500, "test body failed")) })
        .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "test body failed");
    assert!(!mock.is_active());
    assert!(mock.registered().is_empty());
}

#[tokio::test]
async fn test_activate_reports_unfired_after_success() {
    let mock = RequestsMock::new();
    mock.add(MockSpec::new(GET, "http://example.com/never"));

    let outcome: Result<u32, MockError> = mock.activate(|| async { Ok(7) }).await;
    assert!(matches!(
        outcome,
        Err(MockError::UnfulfilledExpectations { .. })
    ));
    assert!(!mock.is_active());
}

#[tokio::test]
async fn test_activate_returns_value() -> Result<(), Box<dyn std::error::Error>> {
    let mock = RequestsMock::new();
    let client = mock.client();
    mock.add(MockSpec::new(GET, "http://example.com/").body("inside"));

    let body = mock
        .activate(|| async { get_text(&client, "http://example.com/").await })
        .await?;
    assert_eq!(body, "inside");
    Ok(())
}

#[tokio::test]
async fn test_assertion_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let mock = RequestsMock::builder()
        .assert_all_requests_are_fired(false)
        .build();
    mock.add(MockSpec::new(GET, "http://example.com/never"));

    mock.enter()?.finish()?;
    Ok(())
}

#[tokio::test]
async fn test_assert_call_count() -> Result<(), Box<dyn std::error::Error>> {
    let mock = RequestsMock::new();
    let client = mock.client();
    mock.add(MockSpec::new(GET, "http://x/"));

    let guard = mock.enter()?;
    send(&client, Method::Get, "http://x").await?;
    send(&client, Method::Get, "http://x/").await?;

    mock.assert_call_count("http://x/", 2)?;
    mock.assert_call_count("http://x", 2)?;
    match mock.assert_call_count("http://x/", 3) {
        Err(MockError::CallCountMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("expected a call count mismatch, got {other:?}"),
    }
    guard.finish()?;
    Ok(())
}

#[tokio::test]
async fn test_replace_upsert_remove_through_session() -> Result<(), Box<dyn std::error::Error>> {
    let mock = RequestsMock::new();
    let client = mock.client();
    mock.add(MockSpec::new(GET, "http://example.com/a").body("old"));
    mock.add(MockSpec::new(GET, "http://example.com/b").body("b"));

    mock.replace(MockSpec::new(GET, "http://example.com/a").body("new"))?;
    mock.upsert(MockSpec::new(GET, "http://example.com/c").body("c"));
    assert!(matches!(
        mock.replace(MockSpec::new(GET, "http://example.com/zzz")),
        Err(MockError::NotRegistered { .. })
    ));
    assert_eq!(mock.remove(GET, "http://example.com/b"), 1);

    let urls: Vec<String> = mock
        .registered()
        .iter()
        .map(|spec| spec.url().to_string())
        .collect();
    assert_eq!(urls, vec!["http://example.com/a", "http://example.com/c"]);

    let guard = mock.enter()?;
    assert_eq!(get_text(&client, "http://example.com/a").await?, "new");
    assert_eq!(get_text(&client, "http://example.com/c").await?, "c");
    guard.finish()?;
    Ok(())
}

#[tokio::test]
async fn test_sessions_are_independent() -> Result<(), Box<dyn std::error::Error>> {
    let first = RequestsMock::new();
    let second = RequestsMock::new();
    let first_client = first.client();
    let second_client = second.client();
    first.add(MockSpec::new(GET, "http://example.com/").body("one"));
    second.add(MockSpec::new(GET, "http://example.com/").body("two"));

    let first_guard = first.enter()?;
    let second_guard = second.enter()?;
    assert_eq!(get_text(&first_client, "http://example.com/").await?, "one");
    assert_eq!(get_text(&second_client, "http://example.com/").await?, "two");
    assert_eq!(first.calls().len(), 1);
    assert_eq!(second.calls().len(), 1);
    first_guard.finish()?;
    second_guard.finish()?;
    Ok(())
}

#[tokio::test]
async fn test_default_mock_is_left_clean() -> Result<(), Box<dyn std::error::Error>> {
    let mock = default_mock();
    assert!(!mock.assert_all_requests_are_fired());
    let client = mock.client();
    mock.add(MockSpec::new(GET, "http://default.example.com/").body("global"));

    {
        let guard = mock.enter()?;
        assert_eq!(
            get_text(&client, "http://default.example.com/").await?,
            "global"
        );
        mock.add(MockSpec::new(GET, "http://default.example.com/unused"));
        guard.finish()?;
    }

    assert!(mock.registered().is_empty());
    assert!(mock.calls().is_empty());

    // With the hook removed the no-network inner client refuses the call.
    assert!(client
        .send(common::request(Method::Get, "http://default.example.com/"))
        .await
        .is_err());
    Ok(())
}

#[tokio::test]
async fn test_default_client_blocks_real_requests() {
    let mock = RequestsMock::new();
    let mut client = mock.client();

    let err = send(&client, Method::Get, "http://example.com/")
        .await
        .unwrap_err();
    assert_eq!(err.status(), http_types::StatusCode::ServiceUnavailable);
    assert!(err.to_string().contains("GET http://example.com/"));

    client.set_config(http_client::Config::new()).unwrap();
    let _ = client.config();
}


//! Transport tests against a local mock HTTP server.

use crate::fixtures;
use crate::transport::{ApiRequest, HttpTransport, ReqwestTransport};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_get_sends_query_and_parses_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v18.0/me"))
        .and(query_param("fields", "id,name"))
        .and(query_param("access_token", "token-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::user_details_body())
                .insert_header("x-app-usage", fixtures::app_usage_header(5, 1, 1).as_str()),
        )
        .mount(&server)
        .await;

    let request = ApiRequest::get(format!("{}/v18.0/me", server.uri()))
        .query("fields", "id,name")
        .query("access_token", "token-1");
    let response = transport().send(request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["id"], "1234567890");
    assert!(response.header("x-app-usage").is_some());
}

#[tokio::test]
async fn test_429_surfaces_status_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v18.0/me"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(fixtures::throttling_error_body())
                .insert_header(
                    "x-ad-account-usage",
                    fixtures::ad_account_usage_header(30).as_str(),
                ),
        )
        .mount(&server)
        .await;

    let request = ApiRequest::get(format!("{}/v18.0/me", server.uri()));
    let failure = transport().send(request).await.unwrap_err();

    assert_eq!(failure.status, Some(429));
    assert_eq!(failure.graph_error().unwrap().code, Some(4));
    assert!(failure.header("x-ad-account-usage").is_some());
    assert!(failure.message.contains("HTTP 429"));
}

#[tokio::test]
async fn test_unreachable_host_is_a_connectivity_failure() {
    // nothing listens on this port
    let request = ApiRequest::get("http://127.0.0.1:1/v18.0/me");
    let failure = transport().send(request).await.unwrap_err();

    assert_eq!(failure.status, None);
    assert!(failure.body.is_none());
}

#[tokio::test]
async fn test_non_json_error_body_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v18.0/me"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let request = ApiRequest::get(format!("{}/v18.0/me", server.uri()));
    let failure = transport().send(request).await.unwrap_err();

    assert_eq!(failure.status, Some(500));
    assert!(failure.graph_error().is_none());
    assert!(failure.message.contains("HTTP 500"));
}

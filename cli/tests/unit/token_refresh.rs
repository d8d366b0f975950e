//! Access-token refresh from the gcloud credentials cache.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use docker_cloud::application::ports::AccessTokenSource;
use docker_cloud::domain::CredentialsError;
use docker_cloud::domain::config::{CredentialsConfig, CredentialsSource};
use docker_cloud::infra::auth::{CredentialsCacheTokenSource, resolve_access_token};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::SshRecorder;

fn write_cache(dir: &Path, token: &str, expiry: &str, token_uri: &str) -> PathBuf {
    let path = dir.join("credentials");
    let body = json!({
        "data": [{
            "key": {"account": "alice@example.com", "type": "google-cloud-sdk"},
            "credential": {
                "_class": "OAuth2Credentials",
                "client_id": "client-1",
                "client_secret": "secret-1",
                "access_token": token,
                "refresh_token": "rt-123",
                "token_expiry": expiry,
                "token_uri": token_uri,
            },
        }],
        "file_version": 1,
    });
    std::fs::write(&path, body.to_string()).expect("write cache");
    path
}

async fn token_endpoint(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-123"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    token_endpoint(
        &server,
        200,
        json!({"access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer"}),
    )
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = write_cache(
        dir.path(),
        "ya29.stale",
        "2000-01-01T00:00:00Z",
        "https://oauth2.invalid/token",
    );
    let before = std::fs::read_to_string(&cache).expect("read");

    let token = CredentialsCacheTokenSource::new(cache.clone())
        .expect("client builds")
        .with_token_uri(format!("{}/token", server.uri()))
        .access_token()
        .await
        .expect("refreshed");

    assert_eq!(token, "ya29.fresh");
    let after = std::fs::read_to_string(&cache).expect("read");
    assert_eq!(before, after, "cache file must not be rewritten");
}

#[tokio::test]
async fn test_refresh_uses_token_uri_from_cache() {
    let server = MockServer::start().await;
    token_endpoint(&server, 200, json!({"access_token": "ya29.fresh"})).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = write_cache(
        dir.path(),
        "",
        "2000-01-01T00:00:00Z",
        &format!("{}/token", server.uri()),
    );

    let config = CredentialsConfig {
        source: CredentialsSource::Cache,
        cache_path: Some(cache),
    };
    let token = resolve_access_token(&config, None, None, &SshRecorder::default())
        .await
        .expect("refreshed");
    assert_eq!(token, "ya29.fresh");
}

#[tokio::test]
async fn test_rejected_refresh_is_refresh_error() {
    let server = MockServer::start().await;
    token_endpoint(
        &server,
        400,
        json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}),
    )
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = write_cache(
        dir.path(),
        "ya29.stale",
        "2000-01-01T00:00:00Z",
        &format!("{}/token", server.uri()),
    );

    let err = CredentialsCacheTokenSource::new(cache)
        .expect("client builds")
        .access_token()
        .await
        .unwrap_err();
    match err.downcast_ref::<CredentialsError>() {
        Some(CredentialsError::Refresh(reason)) => {
            assert!(reason.starts_with("400:"), "got: {reason}");
            assert!(reason.contains("invalid_grant"), "got: {reason}");
        }
        other => panic!("expected refresh error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fresh_token_skips_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = write_cache(
        dir.path(),
        "ya29.current",
        "2999-01-01T00:00:00Z",
        &format!("{}/token", server.uri()),
    );

    let token = CredentialsCacheTokenSource::new(cache)
        .expect("client builds")
        .access_token()
        .await
        .expect("cached token");
    assert_eq!(token, "ya29.current");
}

#[tokio::test]
async fn test_stalled_token_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "ya29.late", "expires_in": 3599}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = write_cache(
        dir.path(),
        "ya29.stale",
        "2000-01-01T00:00:00Z",
        &format!("{}/token", server.uri()),
    );

    let started = std::time::Instant::now();
    let err = CredentialsCacheTokenSource::new(cache)
        .expect("client builds")
        .with_timeout(Duration::from_millis(200))
        .expect("client builds")
        .access_token()
        .await
        .unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<CredentialsError>(),
            Some(CredentialsError::Refresh(_))
        ),
        "got: {err:#}"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

//! Tests for the sonar blueprint

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::blueprint::clock::MockClock;
use crate::blueprint::configmap::{conflict_message, MockConfigMaps};
use axum::{body::Body, http::Request};
use tower::ServiceExt;

fn blueprint(store: Arc<MockConfigMaps>, second: u32) -> SonarBlueprint {
    SonarBlueprint::with_clock("test", store, Arc::new(MockClock::at_second(second)))
}

async fn get_sonar(blueprint: &SonarBlueprint) -> (StatusCode, Vec<u8>) {
    let app = blueprint.routes(Router::new());
    let response = app
        .oneshot(Request::builder().uri(SONAR_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[test]
fn test_append_to_existing_value() {
    let mut configmap = ConfigMap {
        data: Some([(DATA_KEY.to_string(), "X".to_string())].into()),
        ..Default::default()
    };

    append_sonar_line(&mut configmap, 7);

    assert_eq!(configmap.data.unwrap()[DATA_KEY], "X\nsonar-7");
}

#[test]
fn test_append_creates_missing_data() {
    let mut configmap = ConfigMap::default();

    append_sonar_line(&mut configmap, 0);

    assert_eq!(configmap.data.unwrap()[DATA_KEY], "\nsonar-0");
}

#[test]
fn test_append_keeps_other_keys() {
    let mut configmap = ConfigMap {
        data: Some([("other".to_string(), "kept".to_string())].into()),
        ..Default::default()
    };

    append_sonar_line(&mut configmap, 59);

    let data = configmap.data.unwrap();
    assert_eq!(data["other"], "kept");
    assert_eq!(data[DATA_KEY], "\nsonar-59");
}

#[tokio::test]
async fn test_sonar_appends_line_and_returns_empty_200() {
    let store = Arc::new(MockConfigMaps::new().with_configmap("test", Some("X")));
    let blueprint = blueprint(store.clone(), 42);

    let (status, body) = get_sonar(&blueprint).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(store.data("test").as_deref(), Some("X\nsonar-42"));
    assert_eq!(store.update_count(), 1);
}

#[tokio::test]
async fn test_sonar_accumulates_across_requests() {
    let store = Arc::new(MockConfigMaps::new().with_configmap("test", Some("start")));
    let clock = Arc::new(MockClock::at_second(10));
    let blueprint = SonarBlueprint::with_clock("test", store.clone(), clock.clone());

    get_sonar(&blueprint).await;
    clock.advance(chrono::Duration::seconds(5));
    get_sonar(&blueprint).await;

    assert_eq!(
        store.data("test").as_deref(),
        Some("start\nsonar-10\nsonar-15")
    );
}

#[tokio::test]
async fn test_sonar_missing_configmap_is_400_without_write() {
    let store = Arc::new(MockConfigMaps::new());
    let blueprint = blueprint(store.clone(), 1);

    let (status, body) = get_sonar(&blueprint).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let parsed: SonarResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.sonar, r#"configmaps "test" not found"#);
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_sonar_update_failure_is_400() {
    let store = Arc::new(
        MockConfigMaps::new()
            .with_configmap("test", Some("X"))
            .failing_updates(),
    );
    let blueprint = blueprint(store.clone(), 3);

    let (status, body) = get_sonar(&blueprint).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let parsed: SonarResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.sonar, conflict_message("test"));
    assert_eq!(store.data("test").as_deref(), Some("X"));
}

/// Two requests reading the same base value: one append is lost
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sonars_can_lose_an_update() {
    let store = Arc::new(
        MockConfigMaps::new()
            .with_configmap("test", Some("X"))
            .with_read_barrier(2),
    );
    let first = blueprint(store.clone(), 1);
    let second = blueprint(store.clone(), 2);

    let (a, b) = tokio::join!(first.ping(), second.ping());
    a.unwrap();
    b.unwrap();

    // Both writes landed, but each was based on "X"
    assert_eq!(store.update_count(), 2);
    let data = store.data("test").unwrap();
    assert!(
        data == "X\nsonar-1" || data == "X\nsonar-2",
        "expected last-write-wins, got {:?}",
        data
    );
}

#[test]
fn test_error_messages_are_raw() {
    assert_eq!(
        SonarError::NotFound("sonar-log".to_string()).to_string(),
        r#"configmaps "sonar-log" not found"#
    );
    assert_eq!(
        SonarError::MissingName.to_string(),
        "ConfigMap missing name in metadata"
    );
}

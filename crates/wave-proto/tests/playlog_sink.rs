//! Play-event dispatch against a mock realtime-database endpoint.

use std::sync::Arc;

use wave_proto::config::{PlayLogConfig, UserConfig};
use wave_proto::playlog::{Identity, PlayLogger, RtdbSink};
use wave_proto::track::TrackRef;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn track() -> TrackRef {
    TrackRef::new("77", "Kun Faya Kun", "A. R. Rahman", "https://art/300x300.jpg", Some("https://p/77".into()))
}

#[tokio::test]
async fn test_dispatch_posts_event_for_guest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/songLog/guests/guest_1_abcdefghi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"-Nx"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let sink = RtdbSink::new(&server.uri()).unwrap();
    let logger = PlayLogger::new(
        Arc::new(sink),
        Identity::Guest {
            client_id: "guest_1_abcdefghi".into(),
        },
    );
    logger.dispatch(&track()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["trackId"], "77");
    assert_eq!(body["title"], "Kun Faya Kun");
    assert_eq!(body["userName"], "Guest");
    assert!(body["epochMs"].is_i64());
}

#[tokio::test]
async fn test_sink_failure_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let logger = PlayLogger::new(
        Arc::new(RtdbSink::new(&server.uri()).unwrap()),
        Identity::Guest { client_id: "g".into() },
    );
    // the task finishes normally even though the sink rejected the event
    assert!(logger.dispatch(&track()).await.is_ok());
}

#[tokio::test]
async fn test_configured_user_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/songLog/users/uid-1.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = PlayLogConfig {
        database_url: Some(server.uri()),
        user: Some(UserConfig {
            uid: "uid-1".into(),
            display_name: Some("Meera".into()),
            email: Some("meera@example.com".into()),
        }),
        client_id_file: dir.path().join("client_id"),
    };
    let logger = PlayLogger::from_config(&config).unwrap();
    assert_eq!(logger.identity().kind(), "users");
    logger.dispatch(&track()).await.unwrap();

    // no guest id is created for a signed-in user
    assert!(!dir.path().join("client_id").exists());
}

#[test]
fn test_guest_id_is_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("sub").join("client_id");
    let first = wave_proto::playlog::guest_client_id(&file);
    let second = wave_proto::playlog::guest_client_id(&file);
    assert!(first.starts_with("guest_"));
    assert_eq!(first, second);
}

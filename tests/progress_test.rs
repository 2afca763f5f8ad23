//! Integration tests for progress persistence against a mock server

use castsync::api::ServerClient;
use castsync::models::MediaType;
use castsync::playback::ProgressTracker;

use mockito::{Matcher, Server};
use serde_json::json;

fn tracker(url: String, media_id: &str) -> ProgressTracker {
    ProgressTracker::new(ServerClient::new(url), MediaType::Episode, media_id)
}

// -----------------------------------------------------------------------------
// Resume loading
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_load_resume_returns_saved_position() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/progress")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "episode".into()),
            Matcher::UrlEncoded("media_id".into(), "e5".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"position": 734.5, "completed": false}"#)
        .create_async()
        .await;

    let t = tracker(server.url(), "e5");
    assert_eq!(t.load_resume().await, Some(734.5));
}

#[tokio::test]
async fn test_positions_under_resume_floor_start_over() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/progress")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"position": 7.2, "completed": false}"#)
        .create_async()
        .await;

    let t = tracker(server.url(), "e5");
    assert_eq!(t.load_resume().await, None);
}

#[tokio::test]
async fn test_completed_items_start_over() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/progress")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"position": 1400.0, "completed": true}"#)
        .create_async()
        .await;

    let t = tracker(server.url(), "e5");
    assert_eq!(t.load_resume().await, None);
}

#[tokio::test]
async fn test_missing_progress_means_no_resume() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/progress")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let t = tracker(server.url(), "e5");
    assert_eq!(t.load_resume().await, None);
}

#[tokio::test]
async fn test_unreachable_server_degrades_to_no_resume() {
    let t = tracker("http://127.0.0.1:1".to_string(), "e5");
    assert_eq!(t.load_resume().await, None);
}

// -----------------------------------------------------------------------------
// Saving
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_save_posts_progress_record() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/api/progress")
        .match_body(Matcher::Json(json!({
            "media_id": "e5",
            "media_type": "episode",
            "position": 120.0,
            "duration": 1440.0,
            "completed": false
        })))
        .with_status(200)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    t.save(120.0, 1440.0).await;
    m.assert_async().await;
}

#[tokio::test]
async fn test_save_completed_marks_record() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/api/progress")
        .match_body(Matcher::Json(json!({
            "media_id": "e5",
            "media_type": "episode",
            "position": 1440.0,
            "duration": 1440.0,
            "completed": true
        })))
        .with_status(200)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    t.save_completed(1440.0).await;
    m.assert_async().await;
}

#[tokio::test]
async fn test_throttled_saves_collapse_small_deltas() {
    let mut server = Server::new_async().await;
    // Positions 100, 103, 104 arrive one second apart; only the first may save
    let m = server
        .mock("POST", "/api/progress")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    t.save_throttled(100.0, 1440.0).await;
    t.save_throttled(103.0, 1440.0).await;
    t.save_throttled(104.0, 1440.0).await;
    m.assert_async().await;
}

#[tokio::test]
async fn test_throttled_save_fires_once_delta_clears() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/api/progress")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    t.save_throttled(100.0, 1440.0).await;
    t.save_throttled(103.0, 1440.0).await;
    t.save_throttled(106.0, 1440.0).await;
    m.assert_async().await;
}

#[tokio::test]
async fn test_failed_save_is_swallowed() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("POST", "/api/progress")
        .with_status(500)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    // Must not panic or surface the error
    t.save(120.0, 1440.0).await;
}

#[tokio::test]
async fn test_rebind_saves_fresh_for_next_episode() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/api/progress")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let mut t = tracker(server.url(), "e5");
    t.save_throttled(100.0, 1440.0).await;

    t.rebind(MediaType::Episode, "e6");
    // Without the rebind this position would be inside the throttle window
    t.save_throttled(102.0, 1500.0).await;
    m.assert_async().await;
}

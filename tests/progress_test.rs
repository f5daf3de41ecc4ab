mod common;

use common::{seed_video, TestApp};
use uuid::Uuid;
use videoflix_backend::modules::progress::model::ProgressUpdate;
use videoflix_backend::modules::progress::service::{ProgressError, ProgressService};

#[tokio::test]
async fn later_update_overwrites_earlier_one() {
    let media = tempfile::tempdir().unwrap();
    let app = TestApp::new(media.path());
    let video = seed_video(&app.videos, media.path()).await;
    let user = Uuid::new_v4();

    let first = ProgressUpdate {
        position_seconds: Some(12.5),
        viewed: Some(false),
    };
    let second = ProgressUpdate {
        position_seconds: Some(40.0),
        viewed: Some(true),
    };
    ProgressService::record_progress(&app.state, user, video, first).await.unwrap();
    let saved = ProgressService::record_progress(&app.state, user, video, second).await.unwrap();

    assert_eq!(saved.position_seconds, 40.0);
    assert!(saved.viewed);

    let stored = ProgressService::get_progress(&app.state, user, video).await.unwrap().unwrap();
    assert_eq!(stored.position_seconds, 40.0);
    assert!(stored.viewed);
}

#[tokio::test]
async fn never_started_is_no_record_not_zero() {
    let media = tempfile::tempdir().unwrap();
    let app = TestApp::new(media.path());
    let video = seed_video(&app.videos, media.path()).await;

    let progress = ProgressService::get_progress(&app.state, Uuid::new_v4(), video).await.unwrap();
    assert!(progress.is_none());
}

#[tokio::test]
async fn partial_update_keeps_other_field() {
    let media = tempfile::tempdir().unwrap();
    let app = TestApp::new(media.path());
    let video = seed_video(&app.videos, media.path()).await;
    let user = Uuid::new_v4();

    let position_only = ProgressUpdate {
        position_seconds: Some(90.0),
        viewed: None,
    };
    let created = ProgressService::record_progress(&app.state, user, video, position_only).await.unwrap();
    assert_eq!(created.position_seconds, 90.0);
    assert!(!created.viewed);

    let viewed_only = ProgressUpdate {
        position_seconds: None,
        viewed: Some(true),
    };
    let updated = ProgressService::record_progress(&app.state, user, video, viewed_only).await.unwrap();
    assert_eq!(updated.position_seconds, 90.0);
    assert!(updated.viewed);
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn progress_is_scoped_per_user() {
    let media = tempfile::tempdir().unwrap();
    let app = TestApp::new(media.path());
    let video = seed_video(&app.videos, media.path()).await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let update = ProgressUpdate {
        position_seconds: Some(5.0),
        viewed: None,
    };
    ProgressService::record_progress(&app.state, alice, video, update).await.unwrap();

    assert!(ProgressService::get_progress(&app.state, bob, video).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_video_is_rejected() {
    let media = tempfile::tempdir().unwrap();
    let app = TestApp::new(media.path());
    let missing = Uuid::new_v4();

    let err = ProgressService::record_progress(&app.state, Uuid::new_v4(), missing, ProgressUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::VideoNotFound(id) if id == missing));
}

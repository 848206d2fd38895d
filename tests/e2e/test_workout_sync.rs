use crate::e2e::helpers::{self, fixtures, DbTestContext};

use chrono::{Duration, TimeZone, Utc};
use fixtures::{mount_me, mount_page, mount_ride_details, mount_workout_details, workout_json, USER_ID};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;
use workout_sync::domain::workout::{SyncReport, WorkoutRow, WorkoutSyncService};
use workout_sync::error::AppError;
use workout_sync::infrastructure::repositories::WorkoutApiRepository;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn sync_service(ctx: &DbTestContext, page_size: u32) -> WorkoutSyncService {
    WorkoutSyncService::new(
        WorkoutApiRepository::new(ctx.exchange()),
        ctx.workout_repo.clone(),
        ctx.clock.clone(),
        page_size,
    )
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_sync_full_history_across_pages(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    mount_page(
        &ctx.server,
        0,
        vec![workout_json("w3", 1_700_000_300), workout_json("w2", 1_700_000_200)],
        true,
    )
    .await;
    mount_page(&ctx.server, 1, vec![workout_json("w1", 1_700_000_100)], false).await;
    for id in ["w1", "w2", "w3"] {
        mount_workout_details(&ctx.server, id, &format!("ride-{}", id)).await;
        mount_ride_details(&ctx.server, &format!("ride-{}", id), 1).await;
    }

    let mut service = sync_service(ctx, 2);
    let report = service.run().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            user_id: USER_ID.to_string(),
            cutoff: 0,
            fetched: 3,
            upserted: 3,
        }
    );
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 3);

    let stored = ctx.workout_repo.find_by_id("w2").await.unwrap().unwrap();
    assert_eq!(stored.start_time, Utc.timestamp_opt(1_700_000_200, 0).unwrap());
    assert_eq!(stored.fetched_at, helpers::t0());
    assert_eq!(stored.payload["fitness_discipline"], json!("cycling"));
    assert_eq!(stored.payload["workout_details"]["ride_id"], json!("ride-w2"));
    assert_eq!(
        stored.payload["ride_details"]["ride"]["title"],
        json!("30 min Power Zone Ride")
    );

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_request_pages_with_configured_limit(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/user/{}/workouts", USER_ID)))
        .and(query_param("limit", "25"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "show_next": false,
        })))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let mut service = sync_service(ctx, 25);
    let report = service.run().await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.upserted, 0);
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 0);

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_stop_at_newest_stored_workout(ctx: &mut DbTestContext) {
    ctx.fixtures
        .create_workout("w1", 1_700_000_100)
        .await
        .expect("Failed to create workout");

    mount_me(&ctx.server).await;
    mount_page(
        &ctx.server,
        0,
        vec![
            workout_json("w3", 1_700_000_300),
            workout_json("w2", 1_700_000_200),
            // Same instant as the stored one: already synced
            workout_json("w1", 1_700_000_100),
            workout_json("w0", 1_700_000_000),
        ],
        true,
    )
    .await;
    // Never requested once the cutoff is reached
    Mock::given(method("GET"))
        .and(path(format!("/api/user/{}/workouts", USER_ID)))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workout/w0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "w0" })))
        .expect(0)
        .mount(&ctx.server)
        .await;

    let mut service = sync_service(ctx, 100);
    let report = service.run().await.unwrap();

    assert_eq!(report.cutoff, 1_700_000_100);
    assert_eq!(report.fetched, 2);
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 3);
    assert!(ctx.workout_repo.find_by_id("w0").await.unwrap().is_none());

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_store_workouts_when_details_fail(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    mount_page(&ctx.server, 0, vec![workout_json("w1", 1_700_000_100)], false).await;
    Mock::given(method("GET"))
        .and(path("/api/workout/w1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let mut service = sync_service(ctx, 100);
    let report = service.run().await.unwrap();

    assert_eq!(report.fetched, 1);
    let stored = ctx.workout_repo.find_by_id("w1").await.unwrap().unwrap();
    assert!(stored.payload.get("workout_details").is_none());
    assert!(stored.payload.get("ride_details").is_none());

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_keep_fetched_workouts_when_a_page_fails(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    mount_page(&ctx.server, 0, vec![workout_json("w2", 1_700_000_200)], true).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/user/{}/workouts", USER_ID)))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&ctx.server)
        .await;
    mount_workout_details(&ctx.server, "w2", "ride-1").await;
    mount_ride_details(&ctx.server, "ride-1", 1).await;

    let mut service = sync_service(ctx, 1);
    let report = service.run().await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.upserted, 1);
    assert!(ctx.workout_repo.find_by_id("w2").await.unwrap().is_some());

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_fail_when_first_page_fails(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/user/{}/workouts", USER_ID)))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let mut service = sync_service(ctx, 100);
    let err = service.run().await.unwrap_err();

    assert!(
        matches!(err, AppError::Upstream { status: 502, .. }),
        "Unexpected error: {:?}",
        err
    );
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 0);

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_fail_when_authorization_is_lost_mid_run(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    mount_page(&ctx.server, 0, vec![workout_json("w2", 1_700_000_200)], true).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/user/{}/workouts", USER_ID)))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&ctx.server)
        .await;
    helpers::mount_grant(
        &ctx.server,
        "refresh_token",
        ResponseTemplate::new(400).set_body_json(helpers::oauth_error("invalid_grant", "revoked")),
        1,
    )
    .await;

    let mut service = sync_service(ctx, 1);
    let err = service.run().await.unwrap_err();

    assert!(
        matches!(err, AppError::Refresh { status: 400, .. }),
        "Unexpected error: {:?}",
        err
    );
    assert_eq!(err.exit_code(), 4);
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 0);

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_fetch_shared_ride_details_once(ctx: &mut DbTestContext) {
    mount_me(&ctx.server).await;
    mount_page(
        &ctx.server,
        0,
        vec![workout_json("w2", 1_700_000_200), workout_json("w1", 1_700_000_100)],
        false,
    )
    .await;
    mount_workout_details(&ctx.server, "w1", "shared-ride").await;
    mount_workout_details(&ctx.server, "w2", "shared-ride").await;
    mount_ride_details(&ctx.server, "shared-ride", 1).await;

    let mut service = sync_service(ctx, 100);
    let report = service.run().await.unwrap();

    assert_eq!(report.fetched, 2);
    let w1 = ctx.workout_repo.find_by_id("w1").await.unwrap().unwrap();
    assert_eq!(w1.payload["ride_details"]["ride"]["id"], json!("shared-ride"));

    ctx.server.verify().await;
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_fail_when_user_lookup_fails(ctx: &mut DbTestContext) {
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ctx.server)
        .await;

    let mut service = sync_service(ctx, 100);
    let err = service.run().await.unwrap_err();

    assert_eq!(err.exit_code(), 7);
    assert_eq!(ctx.workout_repo.count().await.unwrap(), 0);
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_upsert_idempotently(ctx: &mut DbTestContext) {
    let fetched_at = helpers::t0();
    let row = WorkoutRow {
        workout_id: "w1".to_string(),
        start_time: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        payload: json!({ "id": "w1", "status": "IN_PROGRESS" }),
        fetched_at,
    };

    assert_eq!(ctx.workout_repo.upsert(&[row.clone()]).await.unwrap(), 1);

    let updated = WorkoutRow {
        payload: json!({ "id": "w1", "status": "COMPLETE" }),
        fetched_at: fetched_at + Duration::hours(1),
        ..row
    };
    ctx.workout_repo.upsert(&[updated.clone()]).await.unwrap();

    assert_eq!(ctx.workout_repo.count().await.unwrap(), 1);
    let stored = ctx.workout_repo.find_by_id("w1").await.unwrap().unwrap();
    assert_eq!(stored, updated);
    assert_eq!(
        ctx.workout_repo.latest_start_time().await.unwrap(),
        Some(Utc.timestamp_opt(1_700_000_100, 0).unwrap())
    );
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_report_no_latest_start_time_for_empty_table(ctx: &mut DbTestContext) {
    assert_eq!(ctx.workout_repo.latest_start_time().await.unwrap(), None);
}

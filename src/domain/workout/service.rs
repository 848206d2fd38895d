use super::model::{SyncReport, Workout, WorkoutRow};
use crate::domain::auth::Clock;
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::{WorkoutApiRepository, WorkoutRepository};
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
const PROGRESS_EVERY: usize = 10;

/// Incremental copy of the workout history into the database.
pub struct WorkoutSyncService {
    api: WorkoutApiRepository,
    workout_repo: Arc<WorkoutRepository>,
    clock: Arc<dyn Clock>,
    page_size: u32,
    ride_cache: Cache<String, Value>,
}

impl WorkoutSyncService {
    pub fn new(
        api: WorkoutApiRepository,
        workout_repo: Arc<WorkoutRepository>,
        clock: Arc<dyn Clock>,
        page_size: u32,
    ) -> Self {
        // Several workouts can share a class; one run never needs more
        let ride_cache = Cache::builder().max_capacity(1_000).build();

        Self {
            api,
            workout_repo,
            clock,
            page_size: page_size.max(1),
            ride_cache,
        }
    }

    pub fn api(&self) -> &WorkoutApiRepository {
        &self.api
    }

    pub fn into_api(self) -> WorkoutApiRepository {
        self.api
    }

    /// Load the persisted token into the API client's token exchange
    pub async fn restore_token(&mut self) -> AppResult<()> {
        if self.api.exchange_mut().restore().await?.is_none() {
            tracing::warn!("No stored token, authentication will rely on client credentials");
        }
        Ok(())
    }

    /// Fetch everything newer than the newest stored workout and upsert it
    pub async fn run(&mut self) -> AppResult<SyncReport> {
        let user = self.api.me().await?;
        tracing::info!(user_id = %user.id, "Authenticated as user");

        let cutoff = self.cutoff().await;
        tracing::info!(cutoff, "Fetching data newer than cutoff");

        let workouts = self.fetch_history(&user.id, cutoff).await?;
        if workouts.is_empty() {
            tracing::info!("No new workouts found");
            return Ok(SyncReport {
                user_id: user.id,
                cutoff,
                fetched: 0,
                upserted: 0,
            });
        }

        tracing::info!(count = workouts.len(), "Transforming workouts");
        let fetched_at = self.clock.now();
        let rows = workouts
            .iter()
            .map(|workout| WorkoutRow::from_workout(workout, fetched_at))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::InvalidResponse(format!("Failed to encode workout: {}", e)))?;

        tracing::info!("Performing upsert");
        let upserted = self.workout_repo.upsert(&rows).await?;
        tracing::info!(upserted, "Upsert complete");

        Ok(SyncReport {
            user_id: user.id,
            cutoff,
            fetched: workouts.len(),
            upserted,
        })
    }

    /// Unix seconds of the newest stored workout, 0 for a full history
    async fn cutoff(&self) -> i64 {
        match self.workout_repo.latest_start_time().await {
            Ok(Some(latest)) => {
                tracing::info!(latest = %latest, "Most recent workout in database");
                latest.timestamp()
            }
            Ok(None) => {
                tracing::info!("No stored workouts, defaulting to full history");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read latest workout time, defaulting to full history");
                0
            }
        }
    }

    /// Page through the history until a workout at or before `cutoff`.
    ///
    /// A later page that fails to load ends paging and what was fetched so
    /// far is kept. A failing first page, or lost authorization on any page,
    /// fails the run.
    pub async fn fetch_history(&mut self, user_id: &str, cutoff: i64) -> AppResult<Vec<Workout>> {
        let started = Instant::now();
        let mut workouts = Vec::new();
        let mut page = 0;

        tracing::info!(user_id = %user_id, cutoff, "Fetching workouts");

        loop {
            tracing::info!(page, "Pulling page");
            let content = match self.api.workouts_page(user_id, page, self.page_size).await {
                Ok(content) => content,
                Err(e) if page == 0 || is_auth_failure(&e) => return Err(e),
                Err(e) => {
                    tracing::error!(page, error = %e, "Error fetching page, stopping");
                    break;
                }
            };

            if content.data.is_empty() {
                break;
            }

            let mut reached_cutoff = false;
            for mut workout in content.data {
                if workout.start_time <= cutoff {
                    tracing::info!(
                        workout_time = workout.start_time,
                        cutoff,
                        "Reached cutoff date, stopping"
                    );
                    reached_cutoff = true;
                    break;
                }

                self.enrich(&mut workout).await;
                workouts.push(workout);

                if workouts.len() % PROGRESS_EVERY == 0 {
                    tracing::info!(
                        processed = workouts.len(),
                        elapsed_secs = %format!("{:.2}", started.elapsed().as_secs_f64()),
                        "Progress"
                    );
                }
            }

            if reached_cutoff || !content.show_next {
                break;
            }
            page += 1;
        }

        Ok(workouts)
    }

    /// Attach workout and ride details. Failures are logged, not fatal.
    async fn enrich(&mut self, workout: &mut Workout) {
        match self.api.workout_details(&workout.id).await {
            Ok(details) => workout.workout_details = Some(details),
            Err(e) => {
                tracing::warn!(workout_id = %workout.id, error = %e, "Failed to fetch workout details");
                return;
            }
        }

        let Some(ride_id) = workout.ride_id().map(str::to_string) else {
            return;
        };

        if let Some(cached) = self.ride_cache.get(&ride_id).await {
            workout.ride_details = Some(cached);
            return;
        }

        match self.api.ride_details(&ride_id).await {
            Ok(details) => {
                self.ride_cache.insert(ride_id, details.clone()).await;
                workout.ride_details = Some(details);
            }
            Err(e) => {
                tracing::warn!(workout_id = %workout.id, ride_id = %ride_id, error = %e, "Failed to fetch ride details");
            }
        }
    }
}

fn is_auth_failure(err: &AppError) -> bool {
    err.requires_reauthentication()
        || matches!(err, AppError::Auth { .. } | AppError::Unauthorized(_))
}

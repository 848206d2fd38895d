use crate::infrastructure::db::DbPool;
use crate::{domain::workout::WorkoutRow, error::AppResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct WorkoutRepository {
    pool: Arc<DbPool>,
}

impl WorkoutRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Start time of the newest stored workout
    pub async fn latest_start_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        let pool = self.pool.as_ref();
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(start_time)
            FROM workouts_raw
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(latest)
    }

    /// Insert or replace rows by `workout_id`, all in one transaction
    pub async fn upsert(&self, rows: &[WorkoutRow]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO workouts_raw (workout_id, start_time, payload, fetched_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (workout_id) DO UPDATE
                SET start_time = EXCLUDED.start_time,
                    payload = EXCLUDED.payload,
                    fetched_at = EXCLUDED.fetched_at
                "#,
            )
            .bind(&row.workout_id)
            .bind(row.start_time)
            .bind(&row.payload)
            .bind(row.fetched_at)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    /// Fetch a stored row
    pub async fn find_by_id(&self, workout_id: &str) -> AppResult<Option<WorkoutRow>> {
        let pool = self.pool.as_ref();
        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            SELECT workout_id, start_time, payload, fetched_at
            FROM workouts_raw
            WHERE workout_id = $1
            "#,
        )
        .bind(workout_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Number of stored workouts
    pub async fn count(&self) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workouts_raw")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

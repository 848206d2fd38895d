use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Authenticated user, from `/api/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// One entry of the workout list, with optional enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    /// Unix seconds
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride_details: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Workout {
    /// Ride id referenced by the workout details, if any
    pub fn ride_id(&self) -> Option<&str> {
        let details = self.workout_details.as_ref()?;
        details
            .get("ride_id")
            .or_else(|| details.get("ride").and_then(|ride| ride.get("id")))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// One page of `/api/user/{id}/workouts`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutPage {
    #[serde(default)]
    pub data: Vec<Workout>,
    #[serde(default)]
    pub show_next: bool,
}

/// Stored shape of a workout
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct WorkoutRow {
    pub workout_id: String,
    pub start_time: DateTime<Utc>,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

impl WorkoutRow {
    pub fn from_workout(workout: &Workout, fetched_at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        let start_time = Utc
            .timestamp_opt(workout.start_time, 0)
            .single()
            .unwrap_or_default();

        Ok(Self {
            workout_id: workout.id.clone(),
            start_time,
            payload: serde_json::to_value(workout)?,
            fetched_at,
        })
    }
}

/// Outcome of one sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub user_id: String,
    pub cutoff: i64,
    pub fetched: usize,
    pub upserted: u64,
}

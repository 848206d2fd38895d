use crate::{
    domain::auth::TokenExchange,
    domain::workout::{UserProfile, WorkoutPage},
    error::AppResult,
};
use serde_json::Value;

/// Typed access to the fitness platform API.
///
/// All calls go through the owned [`TokenExchange`], so an expired or
/// rejected token is renewed transparently.
pub struct WorkoutApiRepository {
    exchange: TokenExchange,
}

impl WorkoutApiRepository {
    pub fn new(exchange: TokenExchange) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &TokenExchange {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut TokenExchange {
        &mut self.exchange
    }

    pub fn into_exchange(self) -> TokenExchange {
        self.exchange
    }

    /// The authenticated user
    pub async fn me(&mut self) -> AppResult<UserProfile> {
        self.exchange.get_json("/api/me").await
    }

    /// One page of the user's workout history, newest first
    pub async fn workouts_page(
        &mut self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> AppResult<WorkoutPage> {
        let path = format!(
            "/api/user/{}/workouts?limit={}&page={}",
            urlencoding::encode(user_id),
            limit,
            page
        );
        self.exchange.get_json(&path).await
    }

    /// Detailed metrics for a workout. `ride.id` is lifted to `ride_id`.
    pub async fn workout_details(&mut self, workout_id: &str) -> AppResult<Value> {
        let path = format!("/api/workout/{}", urlencoding::encode(workout_id));
        let mut details: Value = self.exchange.get_json(&path).await?;

        let ride_id = details
            .get("ride")
            .and_then(|ride| ride.get("id"))
            .cloned();
        if let (Some(ride_id), Some(object)) = (ride_id, details.as_object_mut()) {
            object.insert("ride_id".to_string(), ride_id);
        }

        Ok(details)
    }

    /// Metadata of the class a workout was taken from
    pub async fn ride_details(&mut self, ride_id: &str) -> AppResult<Value> {
        let path = format!("/api/ride/{}/details", urlencoding::encode(ride_id));
        self.exchange.get_json(&path).await
    }
}

pub mod model;
pub mod service;

pub use model::{SyncReport, UserProfile, Workout, WorkoutPage, WorkoutRow};
pub use service::{WorkoutSyncService, DEFAULT_PAGE_SIZE};

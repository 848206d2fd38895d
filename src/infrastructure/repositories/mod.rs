pub mod token_repository;
pub mod workout_api_repository;
pub mod workout_repository;

pub use token_repository::{FileTokenRepository, InMemoryTokenRepository, TokenRepository};
pub use workout_api_repository::WorkoutApiRepository;
pub use workout_repository::WorkoutRepository;

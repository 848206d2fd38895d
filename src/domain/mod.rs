pub mod auth;
pub mod workout;

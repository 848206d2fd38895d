pub mod sync;
pub mod token;

pub use sync::SyncController;
pub use token::{TokenController, TokenStatus};

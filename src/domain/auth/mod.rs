pub mod clock;
pub mod dto;
pub mod model;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dto::{OAuthErrorBody, TokenEndpointResponse};
pub use model::TokenRecord;
pub use service::{ClientCredentials, TokenExchange, DEFAULT_SAFETY_MARGIN_SECS};

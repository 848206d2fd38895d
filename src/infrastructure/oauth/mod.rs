pub mod token_client;

pub use token_client::{OAuthTokenClient, TokenGrant, TokenRequestEncoding};

//! Security for the search gateway

mod auth;

pub use auth::{AuthGate, AuthMode, bearer_token};

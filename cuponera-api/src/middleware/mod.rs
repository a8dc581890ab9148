pub mod auth;

pub use auth::{customer_auth_middleware, customer_identity_middleware, CustomerClaims};

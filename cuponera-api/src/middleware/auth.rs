use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use cuponera_core::Customer;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const CUSTOMER_ROLE: &str = "CUSTOMER";

// ============================================================================
// JWT Claims
// ============================================================================

/// `sub` is the stable customer id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn decode_customer(token: &str, secret: &str) -> Result<CustomerClaims, StatusCode> {
    let token_data = decode::<CustomerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if token_data.claims.role != CUSTOMER_ROLE {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(token_data.claims)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Rejects the request unless it carries a valid customer token.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let token = bearer_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode, validate and check role
    let claims = decode_customer(token, &state.auth.secret)?;

    // 3. Inject identity into request extensions
    req.extensions_mut().insert(Customer::authenticated(claims.sub.clone()));
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Resolves the caller to a [`Customer`], anonymous when no token is sent.
/// A token that is present but invalid is still rejected.
pub async fn customer_identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let customer = match bearer_token(&req) {
        Some(token) => Customer::authenticated(decode_customer(token, &state.auth.secret)?.sub),
        None => Customer::anonymous(),
    };

    req.extensions_mut().insert(customer);

    Ok(next.run(req).await)
}

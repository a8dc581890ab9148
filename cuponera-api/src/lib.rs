use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use cuponera_store::rate_limit_key;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod coupons;
pub mod error;
pub mod middleware;
pub mod offers;
pub mod state;

pub use state::{AppState, AuthConfig};

const RATE_LIMIT_WINDOW_SECONDS: i64 = 60;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(offers::routes(state.clone()))
        .merge(coupons::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

/// Per-IP fixed window. Skipped without Redis or a peer address, and fails
/// open on Redis errors.
async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let limit = state.business_rules.rate_limit_per_minute;
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let (Some(redis), Some(ip)) = (state.redis.as_ref(), peer) else {
        return next.run(req).await;
    };
    if limit <= 0 {
        return next.run(req).await;
    }

    match redis.check_rate_limit(&rate_limit_key(&ip), limit, RATE_LIMIT_WINDOW_SECONDS).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!("Rate limit exceeded for {}", ip);
            (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, letting request through: {}", e);
            next.run(req).await
        }
    }
}

//! HTTP routing configuration with authentication and rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::AppState;
use crate::domain::{ErrorDetail, ErrorResponse, RateLimitResponse};

use super::handlers::{
    create_item_handler, create_user_handler, delete_item_handler, get_item_handler,
    get_user_handler, health_check_handler, list_items_handler, list_users_handler,
    liveness_handler, metrics_handler, readiness_handler, set_item_sold_handler,
};
use super::middleware::auth_middleware;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Room for the text fields and multipart framing on top of the photo limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for item and user endpoints
    pub general_rps: u32,
    /// Burst size for item and user endpoints
    pub general_burst: u32,
    /// Requests per second for health and metrics endpoints
    pub health_rps: u32,
    /// Burst size for health and metrics endpoints
    pub health_burst: u32,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only enable behind a
    /// proxy that overwrites these headers; clients can set them freely.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 10,
            general_burst: 20,
            health_rps: 100,
            health_burst: 100,
            trust_proxy_headers: false,
        }
    }
}

type KeyedLimiter = RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Shared rate limiter state (keyed by client IP to prevent global DoS)
pub struct RateLimitState {
    general_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        let general_quota =
            Quota::per_second(non_zero(config.general_rps)).allow_burst(non_zero(config.general_burst));
        let health_quota =
            Quota::per_second(non_zero(config.health_rps)).allow_burst(non_zero(config.health_burst));

        Self {
            general_limiter: RateLimiter::dashmap(general_quota),
            health_limiter: RateLimiter::dashmap(health_quota),
            config,
        }
    }
}

/// Extract client IP from request.
///
/// Forwarding headers are read only when `trust_proxy_headers` is set;
/// otherwise the peer address from ConnectInfo is used. Falls back to
/// 0.0.0.0 when unknown; unknown clients share one bucket.
fn client_ip_from_request<B>(request: &Request<B>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        // Client is first in X-Forwarded-For
        if let Some(ip) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
        {
            return ip;
        }
        if let Some(ip) = request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return ip;
        }
    }
    // Present when served through into_make_service_with_connect_info
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn retry_after_secs(not_until: &governor::NotUntil<governor::clock::QuantaInstant>) -> u64 {
    let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
        &governor::clock::DefaultClock::default(),
    ));
    wait_time.as_secs().max(1)
}

/// Rate limit middleware for item and user endpoints
async fn rate_limit_general_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request, rate_limit.config.trust_proxy_headers);
    let limit = HeaderValue::from(rate_limit.config.general_rps);

    match rate_limit.general_limiter.check_key(&client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert("X-RateLimit-Limit", limit);
            response
        }
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            let body = RateLimitResponse {
                error: ErrorDetail::new(
                    "rate_limited",
                    "Rate limit exceeded. Please slow down your requests.",
                ),
                retry_after,
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit);
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Rate limit middleware for health endpoints
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request, rate_limit.config.trust_proxy_headers);
    match rate_limit.health_limiter.check_key(&client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            let body = ErrorResponse {
                error: ErrorDetail::new("rate_limited", "Rate limit exceeded"),
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Item and user routes. Writes go through bearer authentication.
fn resource_routes(app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = app_state
        .service
        .settings()
        .photo_policy
        .max_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    let public = Router::new()
        .route("/items", get(list_items_handler))
        .route("/items/{id}", get(get_item_handler))
        .route("/users", get(list_users_handler))
        .route("/users/{uid}", get(get_user_handler));

    let protected = Router::new()
        .route(
            "/items",
            post(create_item_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/items/{id}", delete(delete_item_handler))
        .route("/items/{id}/sold", patch(set_item_sold_handler))
        .route("/users", post(create_user_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(app_state),
            auth_middleware,
        ));

    public.merge(protected)
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}

fn build_router(
    app_state: Arc<AppState>,
    rate_limit: Option<RateLimitConfig>,
    request_timeout: Duration,
) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    let mut resources = resource_routes(&app_state);
    let mut health = health_routes();

    if let Some(config) = rate_limit {
        let rate_limit_state = Arc::new(RateLimitState::new(config));
        resources = resources.layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limit_state),
            rate_limit_general_middleware,
        ));
        health = health.layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_health_middleware,
        ));
    }

    Router::new()
        .merge(resources)
        .merge(health)
        .layer(middleware)
        .with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    build_router(app_state, None, DEFAULT_REQUEST_TIMEOUT)
}

/// Create router with rate limiting enabled
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    build_router(app_state, Some(config), DEFAULT_REQUEST_TIMEOUT)
}

/// Create router with rate limiting and a custom request timeout
pub fn create_router_with_options(
    app_state: Arc<AppState>,
    config: RateLimitConfig,
    request_timeout: Duration,
) -> Router {
    build_router(app_state, Some(config), request_timeout)
}

//! 路由配置模块

use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use promo_shared::observability::middleware as obs_middleware;

use super::{handlers, state::AppState};

/// 构建 `/api/v1` 下的业务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 促销管理
        .route(
            "/promotions",
            post(handlers::create_promotion).get(handlers::list_promotions),
        )
        .route("/promotions/{id}", get(handlers::get_promotion))
        .route(
            "/promotions/{id}/status",
            patch(handlers::update_promotion_status),
        )
        .route(
            "/promotions/{id}/limits",
            put(handlers::update_promotion_limits),
        )
        .route(
            "/promotions/{id}/ledger",
            get(handlers::get_promotion_ledger),
        )
        // 风险画像
        .route(
            "/risk-profiles/{player_id}",
            put(handlers::upsert_risk_profile),
        )
        .route(
            "/risk-profiles/{player_id}/assessment",
            get(handlers::get_risk_assessment),
        )
        // 事件处理
        .route("/events", post(handlers::process_event))
        .route("/event-kinds", get(handlers::list_event_kinds))
        .route("/health", get(handlers::health_check))
}

/// 组装完整应用路由（含追踪、请求 ID 和超时中间件）
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

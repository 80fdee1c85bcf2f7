//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "promo_events_total",
        "Total number of player events processed, by outcome"
    );
    metrics::describe_histogram!(
        "promo_event_processing_duration_seconds",
        "Player event processing duration in seconds"
    );
    metrics::describe_counter!("promo_awards_total", "Total number of awards issued");
    metrics::describe_counter!(
        "promo_not_eligible_total",
        "Total number of not-eligible decisions, by reason"
    );
    metrics::describe_counter!(
        "promo_ledger_rejections_total",
        "Total number of ledger reservation rejections, by reason"
    );
    metrics::describe_counter!(
        "promo_publish_failures_total",
        "Total number of awards that could not be published downstream"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次事件处理
#[inline]
pub fn record_event_processed(outcome: &str, duration_secs: f64) {
    metrics::counter!("promo_events_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("promo_event_processing_duration_seconds").record(duration_secs);
}

/// 记录发奖
#[inline]
pub fn record_award(promotion_id: &str) {
    metrics::counter!("promo_awards_total", "promotion_id" => promotion_id.to_string())
        .increment(1);
}

/// 记录不符合资格的判定
#[inline]
pub fn record_not_eligible(reason: &str) {
    metrics::counter!("promo_not_eligible_total", "reason" => reason.to_string()).increment(1);
}

/// 记录账本拒绝
#[inline]
pub fn record_ledger_rejection(reason: &str) {
    metrics::counter!("promo_ledger_rejections_total", "reason" => reason.to_string())
        .increment(1);
}

/// 记录发布失败
#[inline]
pub fn record_publish_failure() {
    metrics::counter!("promo_publish_failures_total").increment(1);
}

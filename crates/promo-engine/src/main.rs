//! 促销决策引擎服务
//!
//! 提供 REST 接口的事件处理与促销管理服务。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use promo_engine::api::{self, AppState};
use promo_engine::{
    Award, ChannelPublisher, InMemoryLedger, PromotionDocument, PromotionEngine, SchemaRegistry,
};
use promo_shared::config::AppConfig;
use promo_shared::observability;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("promo-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        "Starting promo-engine on {}",
        config.server_addr()
    );

    let registry = Arc::new(SchemaRegistry::with_builtin_catalog());
    info!("Event schema registry initialized with {} kinds", registry.len());

    let ledger = Arc::new(InMemoryLedger::new(Duration::from_millis(
        config.engine.ledger_lock_timeout_ms,
    )));
    let (publisher, awards) = ChannelPublisher::new(config.engine.publish_buffer);
    let engine = Arc::new(PromotionEngine::new(registry, ledger, Arc::new(publisher)));

    tokio::spawn(run_settlement_sink(awards));

    if let Some(dir) = &config.engine.promotions_dir {
        match load_promotions(&engine, dir) {
            Ok(count) => info!("Loaded {} promotions from {}", count, dir.display()),
            Err(e) => warn!(
                "Failed to read promotions from {}: {}, starting with empty store",
                dir.display(),
                e
            ),
        }
    }

    let app = api::build_router(
        AppState::new(Arc::clone(&engine)),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let republished = engine.republish_pending();
    if republished > 0 {
        info!("Republished {} pending awards before exit", republished);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// 扫描目录下的 *.json 促销文档，编译并加载
///
/// 单个文件失败只记录警告，不影响其他文件
fn load_promotions(engine: &PromotionEngine, dir: &Path) -> Result<usize> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        let result = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| {
                serde_json::from_str::<PromotionDocument>(&content).map_err(anyhow::Error::from)
            })
            .and_then(|document| engine.load_document(&document).map_err(anyhow::Error::from));

        match result {
            Ok(definition) => {
                info!(
                    promotion_id = %definition.id,
                    status = %definition.status,
                    "Loaded promotion from {}",
                    path.display()
                );
                loaded += 1;
            }
            Err(e) => warn!("Skipping promotion file {}: {}", path.display(), e),
        }
    }

    Ok(loaded)
}

/// 结算落地：消费发布通道中的奖励
///
/// 实际的钱包入账由下游系统负责，这里只记录审计日志
async fn run_settlement_sink(mut awards: mpsc::Receiver<Award>) {
    while let Some(award) = awards.recv().await {
        info!(
            award_id = %award.award_id,
            promotion_id = %award.promotion_id,
            player_id = %award.player_id,
            value = award.value,
            risk_action = award.risk_action.as_str(),
            "Award settled"
        );
    }
    info!("Award channel closed, settlement sink stopped");
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

//! 应用状态定义

use std::sync::Arc;

use crate::engine::PromotionEngine;

/// Axum 应用共享状态
///
/// 引擎内部各存储均为线程安全结构，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PromotionEngine>,
}

impl AppState {
    pub fn new(engine: Arc<PromotionEngine>) -> Self {
        Self { engine }
    }
}

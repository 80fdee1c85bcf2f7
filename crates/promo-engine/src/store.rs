//! 促销定义存储
//!
//! 使用 DashMap 保存编译后的促销定义。激活后的定义不可变，只允许状态流转和额度调整，
//! 每次变更都替换为新的 `Arc`，正在评估的事件继续持有旧版本。

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, instrument, warn};

use crate::error::{EngineError, Result};
use crate::models::{LimitConfig, PromotionDefinition, PromotionStatus};

/// 促销存储
#[derive(Clone, Default)]
pub struct PromotionStore {
    promotions: Arc<DashMap<String, Arc<PromotionDefinition>>>,
}

impl PromotionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.promotions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promotions.is_empty()
    }

    /// 加载促销定义
    ///
    /// 同 ID 的草稿可以被覆盖；已激活过的定义不可整体替换。
    #[instrument(skip_all, fields(promotion_id = %definition.id, status = %definition.status))]
    pub fn load(&self, definition: PromotionDefinition) -> Result<Arc<PromotionDefinition>> {
        let definition = Arc::new(definition);
        match self.promotions.entry(definition.id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().status != PromotionStatus::Draft {
                    warn!("促销已激活过，拒绝覆盖");
                    return Err(EngineError::PromotionExists(definition.id.clone()));
                }
                entry.insert(Arc::clone(&definition));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&definition));
            }
        }
        info!("促销已加载");
        Ok(definition)
    }

    pub fn get(&self, promotion_id: &str) -> Option<Arc<PromotionDefinition>> {
        self.promotions.get(promotion_id).map(|p| Arc::clone(p.value()))
    }

    pub fn contains(&self, promotion_id: &str) -> bool {
        self.promotions.contains_key(promotion_id)
    }

    /// 变更状态（暂停/恢复/结束）
    ///
    /// 目标状态与当前一致时视为幂等操作。
    #[instrument(skip(self))]
    pub fn update_status(
        &self,
        promotion_id: &str,
        status: PromotionStatus,
    ) -> Result<Arc<PromotionDefinition>> {
        let mut entry = self
            .promotions
            .get_mut(promotion_id)
            .ok_or_else(|| EngineError::PromotionNotFound(promotion_id.to_string()))?;

        let current = entry.status;
        if current == status {
            return Ok(Arc::clone(entry.value()));
        }
        if !current.can_transition_to(status) {
            warn!(from = %current, to = %status, "非法的状态变更");
            return Err(EngineError::InvalidTransition {
                promotion_id: promotion_id.to_string(),
                from: current.to_string(),
                to: status.to_string(),
            });
        }

        let mut updated = PromotionDefinition::clone(entry.value());
        updated.status = status;
        let updated = Arc::new(updated);
        *entry = Arc::clone(&updated);

        info!(from = %current, to = %status, "促销状态已变更");
        Ok(updated)
    }

    /// 调整额度配置（账本由调用方同步）
    #[instrument(skip(self, limits))]
    pub fn update_limits(
        &self,
        promotion_id: &str,
        limits: LimitConfig,
    ) -> Result<Arc<PromotionDefinition>> {
        let mut entry = self
            .promotions
            .get_mut(promotion_id)
            .ok_or_else(|| EngineError::PromotionNotFound(promotion_id.to_string()))?;

        let mut updated = PromotionDefinition::clone(entry.value());
        updated.limits = limits;
        let updated = Arc::new(updated);
        *entry = Arc::clone(&updated);

        info!(?limits, "促销额度已更新");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub fn remove(&self, promotion_id: &str) -> Result<Arc<PromotionDefinition>> {
        self.promotions
            .remove(promotion_id)
            .map(|(_, p)| {
                info!("促销已删除");
                p
            })
            .ok_or_else(|| EngineError::PromotionNotFound(promotion_id.to_string()))
    }

    /// 当前生效的促销，按 ID 排序保证处理顺序确定
    pub fn list_active(&self) -> Vec<Arc<PromotionDefinition>> {
        let mut active: Vec<_> = self
            .promotions
            .iter()
            .filter(|p| p.is_active())
            .map(|p| Arc::clone(p.value()))
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    pub fn list_all(&self) -> Vec<Arc<PromotionDefinition>> {
        let mut all: Vec<_> = self
            .promotions
            .iter()
            .map(|p| Arc::clone(p.value()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

//! 奖励发放与发布
//!
//! 只有持有账本预留凭证才会创建奖励。奖励先落入存储，再发布给下游结算/通知；
//! 发布失败不回滚奖励，而是留在待发布队列中，由 `republish_pending` 重试。

use std::sync::Arc;

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use promo_shared::observability::metrics;

use crate::ledger::Reservation;
use crate::models::{Award, PromotionDefinition};
use crate::reward::RewardQuote;
use crate::risk::RiskAction;

/// 发布错误
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("发布通道已满")]
    ChannelFull,

    #[error("发布通道已关闭")]
    ChannelClosed,

    #[error("发布失败: {0}")]
    Downstream(String),
}

/// 奖励发布接口
///
/// 调用方不能被下游阻塞，实现需立即返回。
#[cfg_attr(test, mockall::automock)]
pub trait AwardPublisher: Send + Sync {
    fn publish(&self, award: &Award) -> Result<(), PublishError>;
}

/// 基于有界 mpsc 通道的发布器
pub struct ChannelPublisher {
    sender: mpsc::Sender<Award>,
}

impl ChannelPublisher {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Award>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

impl AwardPublisher for ChannelPublisher {
    fn publish(&self, award: &Award) -> Result<(), PublishError> {
        self.sender.try_send(award.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::ChannelClosed,
        })
    }
}

type AwardKey = (String, String);

/// 奖励存储
///
/// 以 `(promotion_id, event_id)` 为键，同一键至多一条记录。
#[derive(Clone, Default)]
pub struct AwardStore {
    awards: Arc<DashMap<AwardKey, Award>>,
    pending: Arc<DashSet<AwardKey>>,
}

impl AwardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入奖励；键已存在时返回已有记录，不覆盖
    pub fn insert(&self, award: Award) -> Award {
        let key = (award.promotion_id.clone(), award.event_id.clone());
        self.awards.entry(key).or_insert(award).clone()
    }

    pub fn get(&self, promotion_id: &str, event_id: &str) -> Option<Award> {
        self.awards
            .get(&(promotion_id.to_string(), event_id.to_string()))
            .map(|a| a.clone())
    }

    /// 按创建时间排序的促销奖励列表
    pub fn list_for_promotion(&self, promotion_id: &str) -> Vec<Award> {
        let mut awards: Vec<Award> = self
            .awards
            .iter()
            .filter(|entry| entry.key().0 == promotion_id)
            .map(|entry| entry.value().clone())
            .collect();
        awards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        awards
    }

    pub fn len(&self) -> usize {
        self.awards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }

    fn mark_pending(&self, award: &Award) {
        self.pending
            .insert((award.promotion_id.clone(), award.event_id.clone()));
    }

    fn clear_pending(&self, award: &Award) {
        self.pending
            .remove(&(award.promotion_id.clone(), award.event_id.clone()));
    }

    /// 待发布的奖励
    pub fn pending(&self) -> Vec<Award> {
        self.pending
            .iter()
            .filter_map(|key| self.awards.get(key.key()).map(|a| a.clone()))
            .collect()
    }
}

/// 奖励发放器
pub struct AwardEmitter {
    store: AwardStore,
    publisher: Arc<dyn AwardPublisher>,
}

impl AwardEmitter {
    pub fn new(store: AwardStore, publisher: Arc<dyn AwardPublisher>) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &AwardStore {
        &self.store
    }

    /// 根据预留凭证创建奖励并发布
    #[instrument(
        skip_all,
        fields(
            promotion_id = %reservation.promotion_id,
            player_id = %reservation.player_id,
            event_id = %reservation.event_id,
        )
    )]
    pub fn emit(
        &self,
        reservation: &Reservation,
        promotion: &PromotionDefinition,
        trigger_id: &str,
        quote: &RewardQuote,
        risk_action: RiskAction,
    ) -> Award {
        let award = self.store.insert(Award {
            award_id: Award::new_id(),
            promotion_id: reservation.promotion_id.clone(),
            player_id: reservation.player_id.clone(),
            event_id: reservation.event_id.clone(),
            trigger_id: trigger_id.to_string(),
            tier_id: quote.tier_id.clone(),
            reward_type: promotion.reward_type,
            value: reservation.value,
            cap_applied: quote.cap_applied,
            wagering_multiplier: quote.wagering_multiplier,
            risk_action,
            credit_timing: promotion.credit_timing.clone(),
            created_at: Utc::now(),
        });

        info!(
            award_id = %award.award_id,
            value = award.value,
            risk_action = risk_action.as_str(),
            "奖励已创建"
        );

        self.publish(&award);
        award
    }

    /// 重新发布待发布队列中的奖励，返回成功数量
    pub fn republish_pending(&self) -> usize {
        let pending = self.store.pending();
        let total = pending.len();
        let published = pending.iter().filter(|award| self.publish(award)).count();
        if total > 0 {
            info!(total, published, "重新发布待发布奖励");
        }
        published
    }

    fn publish(&self, award: &Award) -> bool {
        match self.publisher.publish(award) {
            Ok(()) => {
                self.store.clear_pending(award);
                true
            }
            Err(e) => {
                warn!(award_id = %award.award_id, error = %e, "奖励发布失败，保留在待发布队列");
                metrics::record_publish_failure();
                self.store.mark_pending(award);
                false
            }
        }
    }
}

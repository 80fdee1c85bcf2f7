//! 额度与预算账本
//!
//! 系统中唯一的共享可变状态。每个促销一份 `LimitState`，由各自的互斥锁保护，
//! 不同促销之间互不阻塞。
//!
//! ## 预留流程（单次加锁内完成检查与扣减）
//!
//! 1. 幂等检查（event_id 已发放 -> DuplicateEvent）
//!    -> 2. 总领取上限 -> 3. 单玩家上限 -> 4. 预算上限
//!    -> 5. 三个计数器同时递增
//!
//! 加锁超过 `lock_timeout` 视为账本无响应，返回 `Rejected(Timeout)`，绝不隐式放行。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, Result};
use crate::models::{LimitConfig, RejectionReason};

/// 默认加锁超时
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(50);

/// 账本预留凭证
///
/// 只有拿到凭证才能创建奖励记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub promotion_id: String,
    pub player_id: String,
    pub event_id: String,
    pub value: f64,
    pub reserved_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        promotion_id: impl Into<String>,
        player_id: impl Into<String>,
        event_id: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            promotion_id: promotion_id.into(),
            player_id: player_id.into(),
            event_id: event_id.into(),
            value,
            reserved_at: Utc::now(),
        }
    }
}

/// 预留结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    Reserved(Reservation),
    Rejected(RejectionReason),
}

/// 账本状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSnapshot {
    pub promotion_id: String,
    pub limits: LimitConfig,
    pub total_claims: u64,
    pub budget_consumed: f64,
    pub players: usize,
    pub awarded_events: usize,
}

/// 账本接口
pub trait LimitLedger: Send + Sync {
    /// 登记促销额度；已登记时以新额度为准，保留现有计数器
    fn register(&self, promotion_id: &str, limits: LimitConfig);

    /// 调整额度配置，已发放的奖励和计数器不受影响
    fn update_limits(&self, promotion_id: &str, limits: LimitConfig) -> Result<()>;

    /// 原子地检查并扣减额度
    fn try_reserve(
        &self,
        promotion_id: &str,
        player_id: &str,
        event_id: &str,
        value: f64,
    ) -> Result<ReservationOutcome>;

    fn snapshot(&self, promotion_id: &str) -> Result<LimitSnapshot>;

    fn player_claims(&self, promotion_id: &str, player_id: &str) -> Result<u64>;
}

#[derive(Debug)]
struct LimitState {
    limits: LimitConfig,
    total_claims: u64,
    per_player_claims: HashMap<String, u64>,
    budget_consumed: f64,
    awarded_events: HashSet<String>,
}

impl LimitState {
    fn new(limits: LimitConfig) -> Self {
        Self {
            limits,
            total_claims: 0,
            per_player_claims: HashMap::new(),
            budget_consumed: 0.0,
            awarded_events: HashSet::new(),
        }
    }

    fn check(&self, player_id: &str, event_id: &str, value: f64) -> Option<RejectionReason> {
        if self.awarded_events.contains(event_id) {
            return Some(RejectionReason::DuplicateEvent);
        }
        if self
            .limits
            .total_claims_cap
            .is_some_and(|cap| self.total_claims + 1 > cap)
        {
            return Some(RejectionReason::GlobalLimitExceeded);
        }
        let claimed = self.per_player_claims.get(player_id).copied().unwrap_or(0);
        if claimed + 1 > self.limits.per_player_cap {
            return Some(RejectionReason::PlayerLimitExceeded);
        }
        if self
            .limits
            .budget_cap
            .is_some_and(|cap| self.budget_consumed + value > cap)
        {
            return Some(RejectionReason::BudgetExhausted);
        }
        None
    }

    fn commit(&mut self, player_id: &str, event_id: &str, value: f64) {
        self.total_claims += 1;
        *self
            .per_player_claims
            .entry(player_id.to_string())
            .or_insert(0) += 1;
        self.budget_consumed += value;
        self.awarded_events.insert(event_id.to_string());
    }
}

/// 内存账本
///
/// 每个促销一把 `parking_lot::Mutex`，外层 `DashMap` 只负责按 ID 查找。
#[derive(Clone)]
pub struct InMemoryLedger {
    states: Arc<DashMap<String, Arc<Mutex<LimitState>>>>,
    lock_timeout: Duration,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryLedger {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            lock_timeout,
        }
    }

    fn state(&self, promotion_id: &str) -> Result<Arc<Mutex<LimitState>>> {
        // 先克隆 Arc 再释放分片锁，避免持有 DashMap 引用时等待促销锁
        self.states
            .get(promotion_id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| EngineError::PromotionNotFound(promotion_id.to_string()))
    }
}

impl LimitLedger for InMemoryLedger {
    #[instrument(skip_all, fields(promotion_id = %promotion_id))]
    fn register(&self, promotion_id: &str, limits: LimitConfig) {
        let state = match self.states.entry(promotion_id.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                info!(?limits, "账本登记促销额度");
                entry.insert(Arc::new(Mutex::new(LimitState::new(limits))));
                return;
            }
        };
        // 重新加载（草稿覆盖、删除后重建）时额度跟随最新定义；
        // 分片锁已释放，这里等待促销锁不会阻塞其他促销
        let mut guard = state.lock();
        if guard.limits != limits {
            info!(old = ?guard.limits, new = ?limits, "重新登记，刷新促销额度");
            guard.limits = limits;
        }
    }

    #[instrument(skip_all, fields(promotion_id = %promotion_id))]
    fn update_limits(&self, promotion_id: &str, limits: LimitConfig) -> Result<()> {
        let state = self.state(promotion_id)?;
        let mut guard = state.try_lock_for(self.lock_timeout).ok_or_else(|| {
            EngineError::LedgerUnavailable(format!("促销 {} 账本加锁超时", promotion_id))
        })?;
        info!(old = ?guard.limits, new = ?limits, "更新促销额度");
        guard.limits = limits;
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(promotion_id = %promotion_id, player_id = %player_id, event_id = %event_id, value = value)
    )]
    fn try_reserve(
        &self,
        promotion_id: &str,
        player_id: &str,
        event_id: &str,
        value: f64,
    ) -> Result<ReservationOutcome> {
        if !value.is_finite() || value < 0.0 {
            return Err(EngineError::InvalidReservation(format!(
                "预留金额无效: {}",
                value
            )));
        }

        let state = self.state(promotion_id)?;
        let Some(mut guard) = state.try_lock_for(self.lock_timeout) else {
            warn!(timeout_ms = self.lock_timeout.as_millis() as u64, "账本加锁超时");
            return Ok(ReservationOutcome::Rejected(RejectionReason::Timeout));
        };

        if let Some(reason) = guard.check(player_id, event_id, value) {
            debug!(reason = %reason, "账本拒绝预留");
            return Ok(ReservationOutcome::Rejected(reason));
        }

        guard.commit(player_id, event_id, value);
        debug!(
            total_claims = guard.total_claims,
            budget_consumed = guard.budget_consumed,
            "额度预留成功"
        );

        Ok(ReservationOutcome::Reserved(Reservation::new(
            promotion_id,
            player_id,
            event_id,
            value,
        )))
    }

    fn snapshot(&self, promotion_id: &str) -> Result<LimitSnapshot> {
        let state = self.state(promotion_id)?;
        let guard = state.try_lock_for(self.lock_timeout).ok_or_else(|| {
            EngineError::LedgerUnavailable(format!("促销 {} 账本加锁超时", promotion_id))
        })?;
        Ok(LimitSnapshot {
            promotion_id: promotion_id.to_string(),
            limits: guard.limits,
            total_claims: guard.total_claims,
            budget_consumed: guard.budget_consumed,
            players: guard.per_player_claims.len(),
            awarded_events: guard.awarded_events.len(),
        })
    }

    fn player_claims(&self, promotion_id: &str, player_id: &str) -> Result<u64> {
        let state = self.state(promotion_id)?;
        let guard = state.try_lock_for(self.lock_timeout).ok_or_else(|| {
            EngineError::LedgerUnavailable(format!("促销 {} 账本加锁超时", promotion_id))
        })?;
        Ok(guard.per_player_claims.get(player_id).copied().unwrap_or(0))
    }
}

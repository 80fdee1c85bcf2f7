//! 判定结果与奖励记录

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::promotion::RewardType;
use crate::risk::{RiskAction, RiskAssessment};

/// 奖励记录
///
/// 账本预留成功后创建，之后不可变。同一 `(promotion_id, event_id)` 至多一条。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub award_id: String,
    pub promotion_id: String,
    pub player_id: String,
    pub event_id: String,
    pub trigger_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_id: Option<String>,
    pub reward_type: RewardType,
    pub value: f64,
    /// 实际生效的上限（降级后为减半后的上限）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_applied: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wagering_multiplier: Option<u32>,
    pub risk_action: RiskAction,
    pub credit_timing: String,
    pub created_at: DateTime<Utc>,
}

impl Award {
    /// 生成新的奖励 ID（按时间有序）
    pub fn new_id() -> String {
        Uuid::now_v7().to_string()
    }
}

/// 资格判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum EligibilityDecision {
    #[serde(rename_all = "camelCase")]
    Eligible {
        trigger_id: String,
        risk: RiskAssessment,
    },
    NotEligible { reason: NotEligibleReason },
}

impl EligibilityDecision {
    pub fn not_eligible(reason: NotEligibleReason) -> Self {
        Self::NotEligible { reason }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

/// 不符合资格的原因（预期结果，不是故障）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotEligibleReason {
    OutOfSchedule,
    AudienceMismatch,
    NoRuleMatch,
    RiskBlocked,
    NoTierMatch,
    RiskDowngradedTypeExcluded,
    ZeroValue,
}

impl NotEligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfSchedule => "out_of_schedule",
            Self::AudienceMismatch => "audience_mismatch",
            Self::NoRuleMatch => "no_rule_match",
            Self::RiskBlocked => "risk_blocked",
            Self::NoTierMatch => "no_tier_match",
            Self::RiskDowngradedTypeExcluded => "risk_downgraded_type_excluded",
            Self::ZeroValue => "zero_value",
        }
    }
}

impl fmt::Display for NotEligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 账本拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// 重复投递，幂等无操作
    DuplicateEvent,
    GlobalLimitExceeded,
    PlayerLimitExceeded,
    BudgetExhausted,
    /// 账本在调用方时限内未响应，绝不视为放行
    Timeout,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateEvent => "duplicate_event",
            Self::GlobalLimitExceeded => "global_limit_exceeded",
            Self::PlayerLimitExceeded => "player_limit_exceeded",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个促销对单个事件的处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionOutcome {
    pub promotion_id: String,
    pub decision: EligibilityDecision,
    pub result: OutcomeResult,
}

impl PromotionOutcome {
    pub fn award(&self) -> Option<&Award> {
        match &self.result {
            OutcomeResult::Awarded { award } => Some(award),
            _ => None,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.result {
            OutcomeResult::Awarded { .. } => "awarded",
            OutcomeResult::NotEligible { .. } => "not_eligible",
            OutcomeResult::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OutcomeResult {
    Awarded { award: Award },
    NotEligible { reason: NotEligibleReason },
    Rejected { reason: RejectionReason },
}

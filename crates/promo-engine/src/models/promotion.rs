//! 促销定义
//!
//! 由向导配置编译而来，激活后除暂停/恢复和额度调整外不可变。
//! 触发器和奖励档位都保持定义顺序，首个命中者生效。

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::event::ParamValue;
use crate::operators::Operator;
use crate::schema::ParamType;

/// 促销定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 促销类别（cashback / deposit_match / tournament 等）
    pub promotion_type: String,
    pub reward_type: RewardType,
    pub audience: Audience,
    pub triggers: Vec<Trigger>,
    pub reward: RewardConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wagering_multiplier: Option<u32>,
    #[serde(default = "default_credit_timing")]
    pub credit_timing: String,
    /// 高风险奖励：风控降级时直接排除
    #[serde(default)]
    pub high_risk: bool,
    pub limits: LimitConfig,
    pub schedule: Schedule,
    pub status: PromotionStatus,
}

fn default_credit_timing() -> String {
    "instant".to_string()
}

impl PromotionDefinition {
    pub fn is_active(&self) -> bool {
        self.status == PromotionStatus::Active
    }
}

/// 促销状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

impl PromotionStatus {
    /// 状态流转规则
    ///
    /// - active 只能从 draft / paused 进入
    /// - paused 只能从 active 进入
    /// - ended 是终态
    pub fn can_transition_to(&self, next: PromotionStatus) -> bool {
        use PromotionStatus::*;
        match (self, next) {
            (Draft | Paused, Active) => true,
            (Active, Paused) => true,
            (Draft | Active | Paused, Ended) => true,
            _ => false,
        }
    }

    pub fn parse_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// 奖励类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Cashback,
    Bonus,
    #[serde(alias = "free_bet")]
    FreeBet,
    #[serde(alias = "spins", alias = "free_spins")]
    FreeSpins,
    Physical,
}

impl RewardType {
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cashback" => Some(Self::Cashback),
            "bonus" => Some(Self::Bonus),
            "freebet" | "free_bet" => Some(Self::FreeBet),
            "spins" | "freespins" | "free_spins" => Some(Self::FreeSpins),
            "physical" => Some(Self::Physical),
            _ => None,
        }
    }

    /// 风控降级时，标记为高风险的这些类型会被排除
    pub fn excluded_on_downgrade(&self) -> bool {
        matches!(self, Self::Bonus | Self::FreeBet)
    }
}

// ==================== 受众定向 ====================

/// 受众定向
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    /// 国家代码（小写），空集表示不限
    #[serde(default)]
    pub markets: BTreeSet<String>,
    /// 渠道标签（小写），空集表示不限
    #[serde(default)]
    pub channels: BTreeSet<String>,
    /// 任一分群命中即可，空列表表示不限
    #[serde(default = "default_segments")]
    pub segments: Vec<Segment>,
}

fn default_segments() -> Vec<Segment> {
    vec![Segment::All]
}

impl Default for Audience {
    fn default() -> Self {
        Self {
            markets: BTreeSet::new(),
            channels: BTreeSet::new(),
            segments: default_segments(),
        }
    }
}

/// 玩家分群
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Segment {
    All,
    New,
    Vip,
    Custom(String),
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::New => "new",
            Self::Vip => "vip",
            Self::Custom(id) => id,
        }
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Self::All,
            "new" => Self::New,
            "vip" => Self::Vip,
            _ => Self::Custom(value.trim().to_string()),
        }
    }
}

impl From<Segment> for String {
    fn from(value: Segment) -> Self {
        value.as_str().to_string()
    }
}

// ==================== 触发器与规则 ====================

/// 触发器：事件类型 + 规则合取
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    pub event_kind: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// 单条规则
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub param: String,
    pub operator: Operator,
    pub value_type: ParamType,
    pub value: RuleValue,
}

impl Rule {
    pub fn new(
        param: impl Into<String>,
        operator: Operator,
        value_type: ParamType,
        value: RuleValue,
    ) -> Self {
        Self {
            param: param.into(),
            operator,
            value_type,
            value,
        }
    }
}

/// 规则取值，激活时已按参数声明类型解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    List(Vec<ParamValue>),
    Scalar(ParamValue),
}

// ==================== 奖励配置 ====================

/// 奖励计算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "calcType", rename_all = "camelCase")]
pub enum RewardConfig {
    Simple(SimpleConfig),
    Tiered(TieredConfig),
}

/// 固定比例
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleConfig {
    pub percentage: f64,
    #[serde(default)]
    pub cap: Option<f64>,
}

/// 分档矩阵
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredConfig {
    pub dimension: TierDimension,
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TierDimension {
    TimePeriod,
    SelectionCount,
}

/// 奖励档位
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub id: String,
    pub dimension_value: String,
    pub segment: String,
    pub percentage: f64,
    #[serde(default)]
    pub cap: Option<f64>,
}

// ==================== 额度与排期 ====================

/// 额度配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitConfig {
    /// 总领取次数上限，None 表示不限
    pub total_claims_cap: Option<u64>,
    pub per_player_cap: u64,
    /// 预算上限，None 表示不限
    pub budget_cap: Option<f64>,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            total_claims_cap: None,
            per_player_cap: 1,
            budget_cap: None,
        }
    }
}

/// 排期，时间窗口为 `[start, end)`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Schedule {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.start.is_some_and(|start| at < start) {
            return false;
        }
        if self.end.is_some_and(|end| at >= end) {
            return false;
        }
        match &self.recurrence {
            Some(recurrence) if !recurrence.days.is_empty() => {
                recurrence.days.contains(&at.weekday())
            }
            _ => true,
        }
    }

    /// 自开始时间起的周序号，从 1 开始
    pub fn week_number(&self, at: DateTime<Utc>) -> Option<i64> {
        let start = self.start?;
        if at < start {
            return None;
        }
        Some((at - start).num_weeks() + 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    #[serde(default)]
    pub days: Vec<Weekday>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

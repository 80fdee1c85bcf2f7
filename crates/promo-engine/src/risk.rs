//! 负责任博彩风控（CRG）
//!
//! 根据玩家行为聚合数据计算综合风险分，并映射为 ALLOW / DOWNGRADE / BLOCK。
//! 评分是纯函数：不修改画像，可并发、重复调用。

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// 风险分阈值
pub const BLOCK_THRESHOLD: f64 = 60.0;
pub const DOWNGRADE_THRESHOLD: f64 = 40.0;

// 权重（百分比）
const WEIGHT_LOSS: u32 = 40;
const WEIGHT_BURST: u32 = 30;
const WEIGHT_DURATION: u32 = 15;
const WEIGHT_COOL_OFF: u32 = 15;

/// 玩家风险画像
///
/// 由外部行为聚合服务定期刷新，引擎只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    #[serde(default)]
    pub player_id: String,
    /// 近 7 日亏损率
    pub loss_ratio_7d: f64,
    /// 近 24 小时充值次数
    pub deposit_burst_24h: u32,
    /// 平均会话时长（分钟）
    pub avg_session_minutes: f64,
    /// 距上次大额亏损的小时数，None 表示近期没有亏损
    #[serde(default)]
    pub hours_since_last_loss: Option<f64>,
}

impl RiskProfile {
    /// 中性基线：没有画像的玩家按此评估
    pub fn baseline(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            loss_ratio_7d: 0.0,
            deposit_burst_24h: 0,
            avg_session_minutes: 0.0,
            hours_since_last_loss: None,
        }
    }
}

/// 风控动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskAction {
    Allow,
    Downgrade,
    Block,
}

impl RiskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Downgrade => "DOWNGRADE",
            Self::Block => "BLOCK",
        }
    }
}

/// 各维度子分（0 / 50 / 100）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskComponents {
    pub loss: u32,
    pub burst: u32,
    pub duration: u32,
    pub cool_off: u32,
}

/// 风险评估结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: f64,
    pub action: RiskAction,
    pub components: RiskComponents,
}

/// 风控闸门
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskGatekeeper;

impl RiskGatekeeper {
    pub fn assess(profile: &RiskProfile) -> RiskAssessment {
        let components = RiskComponents {
            loss: step_at_least(profile.loss_ratio_7d, 0.30, 0.60),
            burst: step_at_least(profile.deposit_burst_24h as f64, 2.0, 4.0),
            duration: step_at_least(profile.avg_session_minutes, 30.0, 60.0),
            cool_off: match profile.hours_since_last_loss {
                Some(hours) if hours < 24.0 => 100,
                Some(hours) if hours < 48.0 => 50,
                _ => 0,
            },
        };

        // 整数加权后再换算，避免 0.15 这类权重的浮点误差
        let weighted = WEIGHT_LOSS * components.loss
            + WEIGHT_BURST * components.burst
            + WEIGHT_DURATION * components.duration
            + WEIGHT_COOL_OFF * components.cool_off;
        let score = weighted as f64 / 100.0;

        let action = if score >= BLOCK_THRESHOLD {
            RiskAction::Block
        } else if score >= DOWNGRADE_THRESHOLD {
            RiskAction::Downgrade
        } else {
            RiskAction::Allow
        };

        RiskAssessment {
            score,
            action,
            components,
        }
    }
}

fn step_at_least(value: f64, half: f64, full: f64) -> u32 {
    if value >= full {
        100
    } else if value >= half {
        50
    } else {
        0
    }
}

/// 风险画像存储
///
/// 保存每个玩家最新的画像，由外部聚合服务写入。
#[derive(Clone, Default)]
pub struct RiskProfileStore {
    profiles: Arc<DashMap<String, RiskProfile>>,
}

impl RiskProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, profile), fields(player_id = %profile.player_id))]
    pub fn upsert(&self, profile: RiskProfile) {
        debug!("更新风险画像");
        self.profiles.insert(profile.player_id.clone(), profile);
    }

    pub fn get(&self, player_id: &str) -> Option<RiskProfile> {
        self.profiles.get(player_id).map(|p| p.clone())
    }

    /// 获取画像，不存在时返回中性基线
    pub fn get_or_baseline(&self, player_id: &str) -> RiskProfile {
        self.get(player_id)
            .unwrap_or_else(|| RiskProfile::baseline(player_id))
    }

    pub fn remove(&self, player_id: &str) -> Option<RiskProfile> {
        self.profiles.remove(player_id).map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

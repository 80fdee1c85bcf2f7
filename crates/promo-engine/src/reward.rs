//! 奖励计算
//!
//! - 固定比例：`min(金额 * 比例 / 100, 上限)`
//! - 分档矩阵：按定义顺序取首个维度值与分群都命中的档位，无命中则不发放
//! - 风控降级：数值与上限减半；高风险的 bonus / freebet 直接排除
//! - bonus 附带流水倍数（只打标，不在此处强制）

use serde::{Deserialize, Serialize};

use crate::models::{
    NotEligibleReason, PromotionDefinition, RewardConfig, RewardType, Schedule, Tier,
    TierDimension, ValidatedEvent,
};
use crate::risk::RiskAction;

/// 投注选项数参数，串关结算事件退回到总腿数
const SELECTION_PARAMS: [&str; 2] = ["Selections Count", "Total Legs"];

/// 计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardQuote {
    pub value: f64,
    pub cap_applied: Option<f64>,
    pub tier_id: Option<String>,
    pub wagering_multiplier: Option<u32>,
}

pub struct RewardCalculator;

impl RewardCalculator {
    pub fn calculate(
        promotion: &PromotionDefinition,
        event: &ValidatedEvent,
        risk_action: RiskAction,
    ) -> Result<RewardQuote, NotEligibleReason> {
        let downgraded = risk_action == RiskAction::Downgrade;
        if downgraded && promotion.high_risk && promotion.reward_type.excluded_on_downgrade() {
            return Err(NotEligibleReason::RiskDowngradedTypeExcluded);
        }

        let (percentage, cap, tier_id) = match &promotion.reward {
            RewardConfig::Simple(config) => (config.percentage, config.cap, None),
            RewardConfig::Tiered(config) => {
                let tier = config
                    .tiers
                    .iter()
                    .find(|tier| {
                        tier_matches(tier, config.dimension, &promotion.schedule, event)
                    })
                    .ok_or(NotEligibleReason::NoTierMatch)?;
                (tier.percentage, tier.cap, Some(tier.id.clone()))
            }
        };

        let raw = event.triggering_amount * percentage / 100.0;
        let mut value = cap.map_or(raw, |cap| raw.min(cap));
        let mut cap_applied = cap;
        if downgraded {
            value /= 2.0;
            cap_applied = cap.map(|c| c / 2.0);
        }

        if value <= 0.0 || !value.is_finite() {
            return Err(NotEligibleReason::ZeroValue);
        }

        let wagering_multiplier = match promotion.reward_type {
            RewardType::Bonus => promotion.wagering_multiplier,
            _ => None,
        };

        Ok(RewardQuote {
            value,
            cap_applied,
            tier_id,
            wagering_multiplier,
        })
    }
}

fn tier_matches(
    tier: &Tier,
    dimension: TierDimension,
    schedule: &Schedule,
    event: &ValidatedEvent,
) -> bool {
    segment_matches(&tier.segment, event) && dimension_matches(tier, dimension, schedule, event)
}

fn is_wildcard(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v.eq_ignore_ascii_case("any")
        || v.eq_ignore_ascii_case("all")
        || v.eq_ignore_ascii_case("all segments")
}

fn segment_matches(segment: &str, event: &ValidatedEvent) -> bool {
    is_wildcard(segment) || event.has_segment(segment)
}

fn dimension_matches(
    tier: &Tier,
    dimension: TierDimension,
    schedule: &Schedule,
    event: &ValidatedEvent,
) -> bool {
    if is_wildcard(&tier.dimension_value) {
        return true;
    }

    match dimension {
        TierDimension::TimePeriod => schedule
            .week_number(event.timestamp)
            .is_some_and(|week| normalize(&tier.dimension_value) == normalize(&format!("Week {}", week))),
        TierDimension::SelectionCount => {
            let count = SELECTION_PARAMS
                .iter()
                .find_map(|name| event.param(name).and_then(|v| v.as_f64()));
            match (count, parse_selection_range(&tier.dimension_value)) {
                (Some(count), Some((min, max))) => {
                    count >= min as f64 && max.is_none_or(|max| count <= max as f64)
                }
                _ => false,
            }
        }
    }
}

fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 解析选项数档位：`6`、`6 Selections`、`6-7 Selections`、`10+`
///
/// 返回 `(下限, 上限)`，上限为 None 表示不封顶。
pub fn parse_selection_range(label: &str) -> Option<(u64, Option<u64>)> {
    let lower = label.trim().to_ascii_lowercase();
    let body = ["selections", "selection", "legs", "leg"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .unwrap_or(&lower)
        .trim();

    if let Some(min) = body.strip_suffix('+') {
        return Some((min.trim().parse().ok()?, None));
    }
    if let Some((min, max)) = body.split_once('-') {
        let min: u64 = min.trim().parse().ok()?;
        let max: u64 = max.trim().parse().ok()?;
        return (min <= max).then_some((min, Some(max)));
    }
    let exact: u64 = body.parse().ok()?;
    Some((exact, Some(exact)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Audience, LimitConfig, ParamValue, PromotionStatus, SimpleConfig, TieredConfig,
    };
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn promotion(reward_type: RewardType, reward: RewardConfig) -> PromotionDefinition {
        PromotionDefinition {
            id: "promo-1".to_string(),
            name: "Test".to_string(),
            description: String::new(),
            promotion_type: "cashback".to_string(),
            reward_type,
            audience: Audience::default(),
            triggers: vec![],
            reward,
            wagering_multiplier: Some(35),
            credit_timing: "instant".to_string(),
            high_risk: false,
            limits: LimitConfig::default(),
            schedule: Schedule {
                start: Some(start()),
                end: None,
                recurrence: None,
            },
            status: PromotionStatus::Active,
        }
    }

    fn simple(percentage: f64, cap: Option<f64>) -> RewardConfig {
        RewardConfig::Simple(SimpleConfig { percentage, cap })
    }

    fn tier(id: &str, value: &str, segment: &str, percentage: f64, cap: Option<f64>) -> Tier {
        Tier {
            id: id.to_string(),
            dimension_value: value.to_string(),
            segment: segment.to_string(),
            percentage,
            cap,
        }
    }

    fn event(amount: f64, days_after_start: i64) -> ValidatedEvent {
        ValidatedEvent {
            event_id: "evt-1".to_string(),
            player_id: "player-1".to_string(),
            event_kind: "deposit".to_string(),
            timestamp: start() + Duration::days(days_after_start),
            params: BTreeMap::new(),
            triggering_amount: amount,
            market: None,
            channel: None,
            segments: vec![],
        }
    }

    #[test]
    fn test_simple_with_cap() {
        let promo = promotion(RewardType::Cashback, simple(10.0, Some(50.0)));
        let quote = RewardCalculator::calculate(&promo, &event(200.0, 0), RiskAction::Allow).unwrap();
        assert_eq!(quote.value, 20.0);
        assert_eq!(quote.cap_applied, Some(50.0));

        let quote = RewardCalculator::calculate(&promo, &event(1000.0, 0), RiskAction::Allow).unwrap();
        assert_eq!(quote.value, 50.0);
        assert_eq!(quote.wagering_multiplier, None);
    }

    #[test]
    fn test_downgrade_halves_value() {
        let promo = promotion(RewardType::Cashback, simple(10.0, Some(50.0)));
        let allow = RewardCalculator::calculate(&promo, &event(200.0, 0), RiskAction::Allow).unwrap();
        let downgrade =
            RewardCalculator::calculate(&promo, &event(200.0, 0), RiskAction::Downgrade).unwrap();
        assert_eq!(downgrade.value, allow.value / 2.0);
        assert_eq!(downgrade.cap_applied, Some(25.0));
    }

    #[test]
    fn test_downgrade_excludes_high_risk_bonus() {
        let mut promo = promotion(RewardType::Bonus, simple(100.0, Some(500.0)));
        promo.high_risk = true;
        assert_eq!(
            RewardCalculator::calculate(&promo, &event(100.0, 0), RiskAction::Downgrade),
            Err(NotEligibleReason::RiskDowngradedTypeExcluded)
        );

        // 未标记高风险只减半
        promo.high_risk = false;
        let quote =
            RewardCalculator::calculate(&promo, &event(100.0, 0), RiskAction::Downgrade).unwrap();
        assert_eq!(quote.value, 50.0);
        assert_eq!(quote.wagering_multiplier, Some(35));

        // 高风险现金返还不在排除范围内
        let mut cashback = promotion(RewardType::Cashback, simple(10.0, None));
        cashback.high_risk = true;
        assert!(
            RewardCalculator::calculate(&cashback, &event(100.0, 0), RiskAction::Downgrade).is_ok()
        );
    }

    #[test]
    fn test_tier_priority_first_match_wins() {
        let promo = promotion(
            RewardType::Cashback,
            RewardConfig::Tiered(TieredConfig {
                dimension: TierDimension::TimePeriod,
                tiers: vec![
                    tier("1", "Week 1", "All Segments", 30.0, None),
                    tier("2", "Week 1", "All Segments", 50.0, None),
                ],
            }),
        );
        for _ in 0..5 {
            let quote =
                RewardCalculator::calculate(&promo, &event(100.0, 2), RiskAction::Allow).unwrap();
            assert_eq!(quote.tier_id.as_deref(), Some("1"));
            assert_eq!(quote.value, 30.0);
        }
    }

    #[test]
    fn test_week_tiers_and_no_match() {
        let promo = promotion(
            RewardType::Cashback,
            RewardConfig::Tiered(TieredConfig {
                dimension: TierDimension::TimePeriod,
                tiers: vec![
                    tier("1", "Week 1", "Low Value (50-200)", 30.0, Some(60.0)),
                    tier("5", "Week 2", "All Segments", 20.0, None),
                ],
            }),
        );

        // 第一周但不在分群内
        assert_eq!(
            RewardCalculator::calculate(&promo, &event(100.0, 1), RiskAction::Allow),
            Err(NotEligibleReason::NoTierMatch)
        );

        let mut low_value = event(300.0, 1);
        low_value.segments = vec!["Low Value (50-200)".to_string()];
        let quote = RewardCalculator::calculate(&promo, &low_value, RiskAction::Allow).unwrap();
        assert_eq!(quote.value, 60.0);

        let quote = RewardCalculator::calculate(&promo, &event(100.0, 8), RiskAction::Allow).unwrap();
        assert_eq!(quote.tier_id.as_deref(), Some("5"));
        assert_eq!(quote.value, 20.0);

        assert_eq!(
            RewardCalculator::calculate(&promo, &event(100.0, 15), RiskAction::Allow),
            Err(NotEligibleReason::NoTierMatch)
        );
    }

    #[test]
    fn test_selection_count_tiers() {
        let promo = promotion(
            RewardType::FreeBet,
            RewardConfig::Tiered(TieredConfig {
                dimension: TierDimension::SelectionCount,
                tiers: vec![
                    tier("a", "6-7 Selections", "Any", 100.0, None),
                    tier("b", "8+", "Any", 200.0, Some(1000.0)),
                ],
            }),
        );

        let mut acca = event(10.0, 0);
        acca.params
            .insert("Selections Count".to_string(), ParamValue::Int(7));
        let quote = RewardCalculator::calculate(&promo, &acca, RiskAction::Allow).unwrap();
        assert_eq!(quote.tier_id.as_deref(), Some("a"));
        assert_eq!(quote.value, 10.0);

        let mut legs = event(10.0, 0);
        legs.params.insert("Total Legs".to_string(), ParamValue::Int(12));
        let quote = RewardCalculator::calculate(&promo, &legs, RiskAction::Allow).unwrap();
        assert_eq!(quote.tier_id.as_deref(), Some("b"));

        assert_eq!(
            RewardCalculator::calculate(&promo, &event(10.0, 0), RiskAction::Allow),
            Err(NotEligibleReason::NoTierMatch)
        );
    }

    #[test]
    fn test_zero_value() {
        let promo = promotion(RewardType::Cashback, simple(10.0, None));
        assert_eq!(
            RewardCalculator::calculate(&promo, &event(0.0, 0), RiskAction::Allow),
            Err(NotEligibleReason::ZeroValue)
        );
    }

    #[test]
    fn test_parse_selection_range() {
        assert_eq!(parse_selection_range("6"), Some((6, Some(6))));
        assert_eq!(parse_selection_range("6 Selections"), Some((6, Some(6))));
        assert_eq!(parse_selection_range("6-7 Selections"), Some((6, Some(7))));
        assert_eq!(parse_selection_range("10+"), Some((10, None)));
        assert_eq!(parse_selection_range("7-6"), None);
        assert_eq!(parse_selection_range("many"), None);
    }
}

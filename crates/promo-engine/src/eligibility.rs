//! 资格闸门
//!
//! 依次检查：状态与排期 → 受众定向 → 规则命中 → 风控。
//! 纯判定函数，不产生任何状态变更。

use crate::evaluator::RuleEvaluator;
use crate::models::{
    Audience, EligibilityDecision, NotEligibleReason, PromotionDefinition, Segment,
    ValidatedEvent,
};
use crate::risk::{RiskAction, RiskGatekeeper, RiskProfile};

pub struct EligibilityGate;

impl EligibilityGate {
    pub fn evaluate(
        event: &ValidatedEvent,
        promotion: &PromotionDefinition,
        profile: &RiskProfile,
    ) -> EligibilityDecision {
        if !promotion.is_active() || !promotion.schedule.contains(event.timestamp) {
            return EligibilityDecision::not_eligible(NotEligibleReason::OutOfSchedule);
        }

        if !Self::audience_matches(&promotion.audience, event) {
            return EligibilityDecision::not_eligible(NotEligibleReason::AudienceMismatch);
        }

        let Some(trigger) = RuleEvaluator::matches_promotion(promotion, event) else {
            return EligibilityDecision::not_eligible(NotEligibleReason::NoRuleMatch);
        };

        let risk = RiskGatekeeper::assess(profile);
        if risk.action == RiskAction::Block {
            return EligibilityDecision::not_eligible(NotEligibleReason::RiskBlocked);
        }

        EligibilityDecision::Eligible {
            trigger_id: trigger.id.clone(),
            risk,
        }
    }

    /// 受众匹配
    ///
    /// 市场、渠道、分群为空时均不限，比较忽略大小写；分群任一命中即可。
    pub fn audience_matches(audience: &Audience, event: &ValidatedEvent) -> bool {
        in_set(&audience.markets, event.market.as_deref())
            && in_set(&audience.channels, event.channel.as_deref())
            && (audience.segments.is_empty()
                || audience.segments.iter().any(|segment| match segment {
                    Segment::All => true,
                    other => event.has_segment(other.as_str()),
                }))
    }
}

fn in_set(allowed: &std::collections::BTreeSet<String>, value: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    value.is_some_and(|v| {
        allowed
            .iter()
            .any(|a| a.eq_ignore_ascii_case(v.trim()))
    })
}

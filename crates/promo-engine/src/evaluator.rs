//! 规则评估器
//!
//! 触发器内的规则为合取，促销内的触发器为析取且按定义顺序取首个命中。
//! 规则取值在激活时已按参数类型解析，这里只做比较：数值统一按 f64 比较，
//! 浮点相等为精确比较（配置端没有容差概念）。

use tracing::debug;

use crate::models::{ParamValue, PromotionDefinition, Rule, RuleValue, Trigger, ValidatedEvent};
use crate::operators::Operator;

/// 规则评估器
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// 评估单条规则
    ///
    /// 事件缺少该参数时不命中。
    pub fn matches_rule(rule: &Rule, event: &ValidatedEvent) -> bool {
        let Some(actual) = event.param(&rule.param) else {
            return false;
        };

        match (&rule.operator, &rule.value) {
            (Operator::In, RuleValue::List(values)) => {
                values.iter().any(|v| Self::equals(actual, v))
            }
            (Operator::In, RuleValue::Scalar(value)) => Self::equals(actual, value),
            (_, RuleValue::Scalar(expected)) => Self::apply(rule.operator, actual, expected),
            (op, RuleValue::List(_)) => {
                debug!(param = %rule.param, operator = %op, "列表取值只适用于 in 操作符");
                false
            }
        }
    }

    /// 评估触发器：事件类型一致且全部规则命中（空规则匹配该类型的任意事件）
    pub fn matches_trigger(trigger: &Trigger, event: &ValidatedEvent) -> bool {
        trigger.event_kind == event.event_kind
            && trigger.rules.iter().all(|rule| Self::matches_rule(rule, event))
    }

    /// 返回首个命中的触发器
    pub fn matches_promotion<'a>(
        promotion: &'a PromotionDefinition,
        event: &ValidatedEvent,
    ) -> Option<&'a Trigger> {
        promotion
            .triggers
            .iter()
            .find(|trigger| Self::matches_trigger(trigger, event))
    }

    fn apply(operator: Operator, actual: &ParamValue, expected: &ParamValue) -> bool {
        match operator {
            Operator::Eq => Self::equals(actual, expected),
            Operator::Neq => !Self::equals(actual, expected),
            Operator::Gt => Self::compare(actual, expected, |a, b| a > b),
            Operator::Gte => Self::compare(actual, expected, |a, b| a >= b),
            Operator::Lt => Self::compare(actual, expected, |a, b| a < b),
            Operator::Lte => Self::compare(actual, expected, |a, b| a <= b),
            Operator::Contains => match (actual.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            Operator::In => Self::equals(actual, expected),
        }
    }

    fn equals(actual: &ParamValue, expected: &ParamValue) -> bool {
        // 整数和浮点统一按 f64 比较（6 == 6.0）
        if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
            return a == b;
        }
        actual == expected
    }

    fn compare<F>(actual: &ParamValue, expected: &ParamValue, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    }
}

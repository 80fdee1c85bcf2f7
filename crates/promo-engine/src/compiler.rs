//! 促销定义编译器
//!
//! 把向导文档解析为强类型的 [`PromotionDefinition`]。规则取值按事件模式中参数的
//! 声明类型解析，类型错误在激活时暴露，而不是在事件评估时。

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use tracing::{debug, info};

use crate::error::{CompileError, EngineError};
use crate::models::{
    Audience, LimitConfig, ParamValue, PromotionDefinition, PromotionStatus, Recurrence,
    RecurrenceFrequency, RewardConfig, RewardType, Rule, RuleValue, Schedule, Segment,
    SimpleConfig, Tier, TierDimension, TieredConfig, Trigger,
};
use crate::operators::Operator;
use crate::schema::{EventKindDef, ParamDef, ParamType, SchemaRegistry};
use crate::wizard::{
    Eligibility, PromotionDocument, Rewards, WizardLimits, WizardRule, WizardSchedule,
    WizardTrigger,
};

/// 表示“不设上限”的取值
const NO_CAP_VALUES: [&str; 3] = ["unlimited", "varies", "none"];

/// 促销编译器
#[derive(Clone)]
pub struct PromotionCompiler {
    registry: Arc<SchemaRegistry>,
}

impl PromotionCompiler {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// 从 JSON 文档编译
    pub fn compile_from_json(&self, json: &str) -> Result<PromotionDefinition, EngineError> {
        let document: PromotionDocument = serde_json::from_str(json)?;
        Ok(self.compile(&document)?)
    }

    /// 编译促销文档
    pub fn compile(&self, document: &PromotionDocument) -> Result<PromotionDefinition, CompileError> {
        let wizard = &document.wizard;

        if document.id.trim().is_empty() {
            return Err(CompileError::MissingField("id".to_string()));
        }
        if wizard.basics.name.trim().is_empty() {
            return Err(CompileError::MissingField("basics.name".to_string()));
        }

        let reward_type = RewardType::parse_name(&wizard.rewards.reward_type).ok_or_else(|| {
            CompileError::InvalidValue {
                field: "rewards.type".to_string(),
                value: wizard.rewards.reward_type.clone(),
            }
        })?;

        let audience = Self::compile_audience(&wizard.eligibility);
        let triggers = wizard
            .eligibility
            .triggers
            .iter()
            .enumerate()
            .map(|(index, trigger)| self.compile_trigger(index, trigger))
            .collect::<Result<Vec<_>, _>>()?;

        if document.status == PromotionStatus::Active && triggers.is_empty() {
            return Err(CompileError::MissingField("eligibility.triggers".to_string()));
        }

        let schedule = Self::compile_schedule(&wizard.schedule)?;
        let reward = Self::compile_reward(&wizard.rewards, &schedule)?;
        let limits = Self::compile_limits(&wizard.schedule.limits)?;

        let wagering_multiplier = match wizard.rewards.wagering.trim() {
            "" => None,
            raw => Some(raw.parse::<u32>().map_err(|_| CompileError::InvalidValue {
                field: "rewards.wagering".to_string(),
                value: raw.to_string(),
            })?),
        };

        let promotion_type = match wizard.basics.promotion_type.trim() {
            "" => wizard.rewards.reward_type.trim().to_ascii_lowercase(),
            t => t.to_string(),
        };

        let credit_timing = match wizard.rewards.credit_timing.trim() {
            "" => "instant".to_string(),
            t => t.to_string(),
        };

        let definition = PromotionDefinition {
            id: document.id.trim().to_string(),
            name: wizard.basics.name.trim().to_string(),
            description: wizard.basics.description.clone(),
            promotion_type,
            reward_type,
            audience,
            triggers,
            reward,
            wagering_multiplier,
            credit_timing,
            high_risk: document.high_risk,
            limits,
            schedule,
            status: document.status,
        };

        info!(
            promotion_id = %definition.id,
            triggers = definition.triggers.len(),
            status = %definition.status,
            "促销定义编译完成"
        );

        Ok(definition)
    }

    /// 解析额度输入
    ///
    /// 总次数、预算为空表示不限；单玩家次数为空时取 1。
    pub fn compile_limits(limits: &WizardLimits) -> Result<LimitConfig, CompileError> {
        let total_claims_cap = parse_optional(&limits.total_claims, "limits.totalClaims", |s| {
            s.parse::<u64>().ok()
        })?;
        let per_player_cap = parse_optional(&limits.per_player, "limits.perPlayer", |s| {
            s.parse::<u64>().ok()
        })?
        .unwrap_or(1);
        let budget_cap = parse_optional(&limits.budget, "limits.budget", parse_amount)?;

        Ok(LimitConfig {
            total_claims_cap,
            per_player_cap,
            budget_cap,
        })
    }

    fn compile_audience(eligibility: &Eligibility) -> Audience {
        let normalize = |values: &[String]| -> BTreeSet<String> {
            values
                .iter()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        };

        let mut segments = vec![Segment::from(eligibility.segment.clone())];
        for custom in &eligibility.custom_segments {
            let segment = Segment::from(custom.clone());
            if !segments.contains(&segment) {
                segments.push(segment);
            }
        }
        // 选择了具体分群时，不再保留 all
        if segments.len() > 1 {
            segments.retain(|s| *s != Segment::All);
        }

        Audience {
            markets: normalize(&eligibility.markets),
            channels: normalize(&eligibility.channels),
            segments,
        }
    }

    fn compile_trigger(&self, index: usize, trigger: &WizardTrigger) -> Result<Trigger, CompileError> {
        let id = match trigger.id.trim() {
            "" => format!("trigger-{}", index + 1),
            id => id.to_string(),
        };

        let kind = self
            .registry
            .kind(&trigger.event_id)
            .ok_or_else(|| CompileError::UnknownEventKind {
                trigger_id: id.clone(),
                event_kind: trigger.event_id.clone(),
            })?;

        let rules = trigger
            .rules
            .iter()
            .map(|rule| Self::compile_rule(kind, rule))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(trigger_id = %id, event_kind = %kind.id, rules = rules.len(), "触发器编译完成");

        Ok(Trigger {
            id,
            event_kind: kind.id.clone(),
            rules,
        })
    }

    fn compile_rule(kind: &EventKindDef, rule: &WizardRule) -> Result<Rule, CompileError> {
        let def = kind
            .find_param(&rule.param)
            .ok_or_else(|| CompileError::UnknownParameter {
                event_kind: kind.id.clone(),
                param: rule.param.clone(),
            })?;

        if !rule.value_type.trim().is_empty()
            && ParamType::parse_name(&rule.value_type) != Some(def.param_type)
        {
            return Err(CompileError::DeclaredTypeMismatch {
                param: rule.param.clone(),
                declared: rule.value_type.clone(),
                schema: def.param_type,
            });
        }

        let operator = Operator::from_str(&rule.operator)?;
        if !operator.supports(def.param_type) {
            return Err(CompileError::InvalidOperator {
                operator: operator.to_string(),
                value_type: def.param_type,
            });
        }

        let value = Self::compile_rule_value(def, operator, &rule.value)?;
        Ok(Rule::new(def.name.clone(), operator, def.param_type, value))
    }

    fn compile_rule_value(
        def: &ParamDef,
        operator: Operator,
        raw: &str,
    ) -> Result<RuleValue, CompileError> {
        let invalid = |message: String| CompileError::InvalidRuleValue {
            param: def.name.clone(),
            value: raw.to_string(),
            message,
        };

        match operator {
            Operator::In => {
                let values = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| def.parse_literal(v).map_err(invalid))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.is_empty() {
                    return Err(invalid("in 列表不能为空".to_string()));
                }
                Ok(RuleValue::List(values))
            }
            // 子串匹配不要求取值属于枚举集合
            Operator::Contains => Ok(RuleValue::Scalar(ParamValue::Str(raw.to_string()))),
            _ => def
                .parse_literal(raw)
                .map(RuleValue::Scalar)
                .map_err(invalid),
        }
    }

    fn compile_reward(rewards: &Rewards, schedule: &Schedule) -> Result<RewardConfig, CompileError> {
        match rewards.calc_type.trim().to_ascii_lowercase().as_str() {
            "" | "simple" => {
                let config = rewards
                    .simple_config
                    .as_ref()
                    .ok_or_else(|| CompileError::MissingField("rewards.simpleConfig".to_string()))?;
                Ok(RewardConfig::Simple(SimpleConfig {
                    percentage: parse_percentage(&config.percentage, "rewards.simpleConfig.percentage")?,
                    cap: parse_cap(&config.cap, "rewards.simpleConfig.cap")?,
                }))
            }
            "tiered" => {
                let dimension = match rewards.matrix_dimension.trim().to_ascii_lowercase().as_str() {
                    "week" | "timeperiod" | "time_period" => TierDimension::TimePeriod,
                    "selections" | "selectioncount" | "selection_count" => {
                        TierDimension::SelectionCount
                    }
                    other => {
                        return Err(CompileError::InvalidValue {
                            field: "rewards.matrixDimension".to_string(),
                            value: other.to_string(),
                        });
                    }
                };

                if rewards.tiers.is_empty() {
                    return Err(CompileError::MissingField("rewards.tiers".to_string()));
                }
                if dimension == TierDimension::TimePeriod && schedule.start.is_none() {
                    return Err(CompileError::InvalidSchedule(
                        "按周分档需要设置开始时间".to_string(),
                    ));
                }

                let tiers = rewards
                    .tiers
                    .iter()
                    .enumerate()
                    .map(|(index, tier)| {
                        let field = format!("rewards.tiers[{}]", index);
                        Ok(Tier {
                            id: match tier.id.trim() {
                                "" => format!("tier-{}", index + 1),
                                id => id.to_string(),
                            },
                            dimension_value: tier.dimension_value.trim().to_string(),
                            segment: tier.segment.trim().to_string(),
                            percentage: parse_percentage(
                                &tier.percentage,
                                &format!("{}.percentage", field),
                            )?,
                            cap: parse_cap(&tier.cap, &format!("{}.cap", field))?,
                        })
                    })
                    .collect::<Result<Vec<_>, CompileError>>()?;

                Ok(RewardConfig::Tiered(TieredConfig { dimension, tiers }))
            }
            other => Err(CompileError::InvalidValue {
                field: "rewards.calcType".to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn compile_schedule(schedule: &WizardSchedule) -> Result<Schedule, CompileError> {
        let start = parse_datetime(&schedule.start_date, "schedule.startDate")?;
        let end = parse_datetime(&schedule.end_date, "schedule.endDate")?;

        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                return Err(CompileError::InvalidSchedule(format!(
                    "结束时间 {} 不晚于开始时间 {}",
                    end, start
                )));
            }
        }

        let recurrence = match (&schedule.recurrence, schedule.is_recurring) {
            (Some(recurrence), true) => {
                let frequency = match recurrence.frequency.trim().to_ascii_lowercase().as_str() {
                    "daily" => RecurrenceFrequency::Daily,
                    "" | "weekly" => RecurrenceFrequency::Weekly,
                    "monthly" => RecurrenceFrequency::Monthly,
                    other => {
                        return Err(CompileError::InvalidValue {
                            field: "schedule.recurrence.frequency".to_string(),
                            value: other.to_string(),
                        });
                    }
                };
                let days = recurrence
                    .days
                    .iter()
                    .map(|day| {
                        Weekday::from_str(day.trim()).map_err(|_| CompileError::InvalidValue {
                            field: "schedule.recurrence.days".to_string(),
                            value: day.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(Recurrence { frequency, days })
            }
            _ => None,
        };

        Ok(Schedule {
            start,
            end,
            recurrence,
        })
    }
}

fn parse_optional<T>(
    raw: &str,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, CompileError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() || NO_CAP_VALUES.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    parse(&cleaned)
        .map(Some)
        .ok_or_else(|| CompileError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_cap(raw: &str, field: &str) -> Result<Option<f64>, CompileError> {
    parse_optional(raw, field, parse_amount)
}

fn parse_percentage(raw: &str, field: &str) -> Result<f64, CompileError> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    parse_amount(trimmed).ok_or_else(|| CompileError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// 解析时间：RFC 3339、`YYYY-MM-DDTHH:MM[:SS]`（按 UTC）或 `YYYY-MM-DD`
fn parse_datetime(raw: &str, field: &str) -> Result<Option<DateTime<Utc>>, CompileError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(naive.and_utc()));
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(midnight.and_utc()));
    }

    Err(CompileError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{Basics, WizardSimpleConfig, WizardState, WizardTier};
    use chrono::TimeZone;

    fn compiler() -> PromotionCompiler {
        PromotionCompiler::new(Arc::new(SchemaRegistry::with_builtin_catalog()))
    }

    fn rule(param: &str, operator: &str, value: &str, value_type: &str) -> WizardRule {
        WizardRule {
            id: "1".to_string(),
            param: param.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
            value_type: value_type.to_string(),
        }
    }

    fn document(rules: Vec<WizardRule>) -> PromotionDocument {
        PromotionDocument {
            id: "promo-1".to_string(),
            status: PromotionStatus::Active,
            high_risk: false,
            wizard: WizardState {
                basics: Basics {
                    name: "Acca Insurance".to_string(),
                    description: String::new(),
                    promotion_type: String::new(),
                },
                eligibility: Eligibility {
                    markets: vec!["KE".to_string(), " gh ".to_string()],
                    channels: vec!["mobile".to_string()],
                    segment: "vip".to_string(),
                    custom_segments: vec!["High Rollers".to_string()],
                    triggers: vec![WizardTrigger {
                        id: String::new(),
                        event_id: "bet_placement".to_string(),
                        rules,
                    }],
                },
                rewards: Rewards {
                    reward_type: "bonus".to_string(),
                    calc_type: "simple".to_string(),
                    simple_config: Some(WizardSimpleConfig {
                        percentage: "100".to_string(),
                        cap: "Unlimited".to_string(),
                    }),
                    wagering: "35".to_string(),
                    ..Default::default()
                },
                schedule: WizardSchedule {
                    start_date: "2026-03-01T00:00".to_string(),
                    end_date: "2026-03-31".to_string(),
                    ..Default::default()
                },
            },
        }
    }

    #[test]
    fn test_compile_simple_promotion() {
        let definition = compiler()
            .compile(&document(vec![
                rule("Stake", ">=", "100", "float"),
                rule("Sport", "in", "Football, Tennis", "enum"),
                rule("Selections Count", "eq", "6", "integer"),
            ]))
            .unwrap();

        assert_eq!(definition.reward_type, RewardType::Bonus);
        assert_eq!(definition.promotion_type, "bonus");
        assert_eq!(definition.wagering_multiplier, Some(35));
        assert_eq!(definition.credit_timing, "instant");
        assert!(definition.audience.markets.contains("ke"));
        assert!(definition.audience.markets.contains("gh"));
        assert_eq!(
            definition.audience.segments,
            vec![Segment::Vip, Segment::Custom("High Rollers".to_string())]
        );

        let trigger = &definition.triggers[0];
        assert_eq!(trigger.id, "trigger-1");
        assert_eq!(trigger.rules[0].value, RuleValue::Scalar(ParamValue::Float(100.0)));
        assert_eq!(
            trigger.rules[1].value,
            RuleValue::List(vec![
                ParamValue::Str("Football".to_string()),
                ParamValue::Str("Tennis".to_string()),
            ])
        );
        assert_eq!(trigger.rules[2].operator, Operator::Eq);
        assert_eq!(trigger.rules[2].value, RuleValue::Scalar(ParamValue::Int(6)));

        match definition.reward {
            RewardConfig::Simple(config) => {
                assert_eq!(config.percentage, 100.0);
                assert_eq!(config.cap, None);
            }
            other => panic!("unexpected reward config: {:?}", other),
        }

        assert_eq!(
            definition.schedule.start,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            definition.schedule.end,
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(definition.limits, LimitConfig::default());
    }

    #[test]
    fn test_reject_unknown_event_kind_and_param() {
        let mut doc = document(vec![]);
        doc.wizard.eligibility.triggers[0].event_id = "jackpot".to_string();
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::UnknownEventKind { .. })
        ));

        let doc = document(vec![rule("Colour", "=", "red", "string")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_reject_type_errors() {
        // 声明类型与模式不一致
        let doc = document(vec![rule("Stake", ">", "10", "string")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::DeclaredTypeMismatch { .. })
        ));

        // 数值参数无法解析
        let doc = document(vec![rule("Stake", ">", "ten", "float")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidRuleValue { .. })
        ));

        // 大小比较不适用于字符串
        let doc = document(vec![rule("League", ">", "A", "string")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidOperator { .. })
        ));

        // 枚举取值不在集合中
        let doc = document(vec![rule("Sport", "=", "Darts", "enum")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidRuleValue { .. })
        ));

        let doc = document(vec![rule("Stake", "between", "1", "float")]);
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_active_requires_trigger() {
        let mut doc = document(vec![]);
        doc.wizard.eligibility.triggers.clear();
        assert_eq!(
            compiler().compile(&doc).unwrap_err(),
            CompileError::MissingField("eligibility.triggers".to_string())
        );

        doc.status = PromotionStatus::Draft;
        assert!(compiler().compile(&doc).is_ok());
    }

    #[test]
    fn test_schedule_validation() {
        let mut doc = document(vec![]);
        doc.wizard.schedule.end_date = "2026-02-01".to_string();
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidSchedule(_))
        ));

        let mut doc = document(vec![]);
        doc.wizard.schedule.start_date = "next monday".to_string();
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidValue { .. })
        ));

        let mut doc = document(vec![]);
        doc.wizard.schedule.start_date = "2026-03-01T08:30:00+03:00".to_string();
        let definition = compiler().compile(&doc).unwrap();
        assert_eq!(
            definition.schedule.start,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 5, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_tiered_config() {
        let mut doc = document(vec![]);
        doc.wizard.rewards.calc_type = "tiered".to_string();
        doc.wizard.rewards.matrix_dimension = "week".to_string();
        doc.wizard.rewards.tiers = vec![
            WizardTier {
                id: "1".to_string(),
                dimension_key: "week".to_string(),
                dimension_value: "Week 1".to_string(),
                segment: "Low Value (50-200)".to_string(),
                percentage: "30".to_string(),
                cap: "60".to_string(),
            },
            WizardTier {
                id: "5".to_string(),
                dimension_key: "week".to_string(),
                dimension_value: "Week 2".to_string(),
                segment: "All Segments".to_string(),
                percentage: "20%".to_string(),
                cap: "Varies".to_string(),
            },
        ];

        let definition = compiler().compile(&doc).unwrap();
        match definition.reward {
            RewardConfig::Tiered(config) => {
                assert_eq!(config.dimension, TierDimension::TimePeriod);
                assert_eq!(config.tiers.len(), 2);
                assert_eq!(config.tiers[0].cap, Some(60.0));
                assert_eq!(config.tiers[1].percentage, 20.0);
                assert_eq!(config.tiers[1].cap, None);
            }
            other => panic!("unexpected reward config: {:?}", other),
        }

        doc.wizard.schedule.start_date = String::new();
        assert!(matches!(
            compiler().compile(&doc),
            Err(CompileError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_compile_limits() {
        let limits = PromotionCompiler::compile_limits(&WizardLimits {
            total_claims: "10,000".to_string(),
            per_player: String::new(),
            budget: "500000".to_string(),
        })
        .unwrap();
        assert_eq!(limits.total_claims_cap, Some(10_000));
        assert_eq!(limits.per_player_cap, 1);
        assert_eq!(limits.budget_cap, Some(500_000.0));

        assert!(PromotionCompiler::compile_limits(&WizardLimits {
            total_claims: "-5".to_string(),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_compile_from_json_reports_json_errors() {
        assert!(matches!(
            compiler().compile_from_json("{not json"),
            Err(EngineError::Json(_))
        ));
    }
}

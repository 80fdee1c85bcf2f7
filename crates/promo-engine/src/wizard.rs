//! 配置向导持久化格式
//!
//! 向导把所有输入都当作字符串保存（数字字段偶尔是 JSON 数字），这里按原样接收，
//! 由 [`crate::compiler::PromotionCompiler`] 在激活时解析成强类型定义。
//! 展示相关的 `display` 块不参与决策，反序列化时直接忽略。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::PromotionStatus;

/// 促销文档：向导状态 + 元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDocument {
    pub id: String,
    #[serde(default = "default_status")]
    pub status: PromotionStatus,
    #[serde(default)]
    pub high_risk: bool,
    pub wizard: WizardState,
}

fn default_status() -> PromotionStatus {
    PromotionStatus::Draft
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub basics: Basics,
    #[serde(default)]
    pub eligibility: Eligibility,
    pub rewards: Rewards,
    #[serde(default)]
    pub schedule: WizardSchedule,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basics {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub promotion_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub custom_segments: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<WizardTrigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardTrigger {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub rules: Vec<WizardRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardRule {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    pub param: String,
    pub operator: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub value: String,
    #[serde(rename = "type", default)]
    pub value_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    #[serde(rename = "type")]
    pub reward_type: String,
    #[serde(default)]
    pub calc_type: String,
    #[serde(default)]
    pub matrix_dimension: String,
    #[serde(default)]
    pub tiers: Vec<WizardTier>,
    #[serde(default)]
    pub simple_config: Option<WizardSimpleConfig>,
    #[serde(default, deserialize_with = "loose_string")]
    pub wagering: String,
    #[serde(default)]
    pub credit_timing: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardTier {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default)]
    pub dimension_key: String,
    #[serde(default)]
    pub dimension_value: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub percentage: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub cap: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSimpleConfig {
    #[serde(default, deserialize_with = "loose_string")]
    pub percentage: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub cap: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSchedule {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence: Option<WizardRecurrence>,
    #[serde(default)]
    pub limits: WizardLimits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardRecurrence {
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub days: Vec<String>,
}

/// 额度输入，也用于运行期调整额度的接口
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardLimits {
    #[serde(default, deserialize_with = "loose_string")]
    pub total_claims: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub per_player: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub budget: String,
}

/// 字符串或数字统一按字符串接收，null 视为空串
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_wizard_document() {
        let doc: PromotionDocument = serde_json::from_value(json!({
            "id": "cashia-launch",
            "status": "active",
            "wizard": {
                "basics": { "name": "Cashia Launch Cashback", "description": "", "type": "cashback" },
                "eligibility": {
                    "markets": ["ke"],
                    "channels": ["mobile", "app"],
                    "segment": "all",
                    "customSegments": [],
                    "triggers": [{
                        "id": "t1",
                        "eventId": "deposit",
                        "rules": [{ "id": 1, "param": "Amount", "operator": ">=", "value": 50, "type": "float" }]
                    }]
                },
                "rewards": {
                    "type": "cashback",
                    "calcType": "tiered",
                    "matrixDimension": "week",
                    "tiers": [
                        { "id": 1, "dimensionKey": "week", "dimensionValue": "Week 1", "segment": "All Segments", "percentage": "30", "cap": "60" }
                    ],
                    "simpleConfig": { "percentage": "100", "cap": "500" },
                    "wagering": 35,
                    "creditTiming": "instant"
                },
                "schedule": {
                    "startDate": "2026-03-01T00:00",
                    "endDate": "",
                    "isRecurring": false,
                    "recurrence": { "frequency": "Weekly", "days": [] },
                    "limits": { "totalClaims": "", "perPlayer": "1", "budget": "" }
                },
                "display": { "title": "ignored", "badges": ["NEW"] }
            }
        }))
        .unwrap();

        assert_eq!(doc.status, PromotionStatus::Active);
        assert!(!doc.high_risk);
        let rule = &doc.wizard.eligibility.triggers[0].rules[0];
        assert_eq!(rule.id, "1");
        assert_eq!(rule.value, "50");
        assert_eq!(doc.wizard.rewards.wagering, "35");
        assert_eq!(doc.wizard.rewards.tiers[0].id, "1");
        assert_eq!(doc.wizard.schedule.limits.per_player, "1");
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let doc: PromotionDocument = serde_json::from_value(json!({
            "id": "p",
            "wizard": {
                "basics": { "name": "Minimal" },
                "rewards": { "type": "bonus" }
            }
        }))
        .unwrap();
        assert_eq!(doc.status, PromotionStatus::Draft);
        assert!(doc.wizard.eligibility.triggers.is_empty());
        assert!(doc.wizard.schedule.limits.per_player.is_empty());
    }
}

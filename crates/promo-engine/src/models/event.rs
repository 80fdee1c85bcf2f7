//! 玩家行为事件

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 原始玩家事件
///
/// 由上游行为采集投递，至少一次语义；`event_id` 是幂等键。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEvent {
    #[serde(alias = "id")]
    pub event_id: String,
    pub player_id: String,
    pub event_kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// 显式金额（投注额、充值额等），缺省时取事件类型的金额参数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// 玩家所属分群（new / vip / 自定义分群 ID）
    #[serde(default)]
    pub segments: Vec<String>,
}

impl PlayerEvent {
    pub fn new(
        event_id: impl Into<String>,
        player_id: impl Into<String>,
        event_kind: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            player_id: player_id.into(),
            event_kind: event_kind.into(),
            timestamp,
            params: Map::new(),
            amount: None,
            market: None,
            channel: None,
            segments: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

/// 强类型参数值
///
/// 枚举参数以字符串形式保存，类型信息由事件模式提供。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// 通过模式校验的事件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedEvent {
    pub event_id: String,
    pub player_id: String,
    pub event_kind: String,
    pub timestamp: DateTime<Utc>,
    pub params: BTreeMap<String, ParamValue>,
    /// 显式金额或金额参数，都缺失时为 0
    pub triggering_amount: f64,
    pub market: Option<String>,
    pub channel: Option<String>,
    pub segments: Vec<String>,
}

impl ValidatedEvent {
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn has_segment(&self, segment: &str) -> bool {
        self.segments
            .iter()
            .any(|s| s.trim().eq_ignore_ascii_case(segment.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_deserialize_camel_case() {
        let event: PlayerEvent = serde_json::from_value(json!({
            "id": "evt-9",
            "playerId": "p-1",
            "eventKind": "bet_placement",
            "timestamp": "2026-03-01T10:00:00Z",
            "params": { "Stake": 100, "Sport": "Football" },
            "market": "ke",
            "segments": ["vip"]
        }))
        .unwrap();

        assert_eq!(event.event_id, "evt-9");
        assert_eq!(event.params.len(), 2);
        assert_eq!(event.amount, None);
        assert_eq!(event.segments, vec!["vip".to_string()]);
    }

    #[test]
    fn test_param_value_accessors() {
        assert_eq!(ParamValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParamValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(ParamValue::Str("x".into()).as_f64(), None);
        assert_eq!(ParamValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ParamValue::Str("Win".into()).to_string(), "Win");
    }
}

//! 事件模式注册表
//!
//! 按事件类型维护参数定义（名称、类型、枚举可选值），负责校验并强制转换
//! 外部输入的玩家事件。注册表本身是只读查找结构，校验过程没有副作用。

mod catalog;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::SchemaError;
use crate::models::{ParamValue, PlayerEvent, ValidatedEvent};

/// 参数声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Float,
    Enum,
    Boolean,
    String,
}

impl ParamType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// 解析配置端使用的类型名（`int`/`float`/`enum`/`bool`/`string`）
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Self::Integer),
            "float" | "number" | "decimal" => Some(Self::Float),
            "enum" => Some(Self::Enum),
            "bool" | "boolean" => Some(Self::Boolean),
            "string" | "str" | "text" => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Enum => "enum",
            Self::Boolean => "boolean",
            Self::String => "string",
        };
        write!(f, "{}", s)
    }
}

/// 事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Sportsbook,
    CrashGame,
    Wallet,
    Casino,
    Lifecycle,
}

/// 参数定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            options: Vec::new(),
            required: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn enumeration(name: impl Into<String>, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Self::new(name, ParamType::Enum)
        }
    }

    /// 把事件中的 JSON 值强制转换为声明类型
    pub fn coerce(&self, value: &Value) -> Result<ParamValue, SchemaError> {
        let mismatch = || SchemaError::TypeMismatch {
            param: self.name.clone(),
            expected: self.param_type,
            actual: json_type_name(value).to_string(),
        };

        match (self.param_type, value) {
            (ParamType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(ParamValue::Int(i)),
                None => n
                    .as_f64()
                    .and_then(integral)
                    .map(ParamValue::Int)
                    .ok_or_else(mismatch),
            },
            (ParamType::Float, Value::Number(n)) => {
                n.as_f64().map(ParamValue::Float).ok_or_else(mismatch)
            }
            (ParamType::Boolean, Value::Bool(b)) => Ok(ParamValue::Bool(*b)),
            (_, Value::String(s)) => self.parse_literal(s).map_err(|_| match self.param_type {
                ParamType::Enum => SchemaError::InvalidEnumValue {
                    param: self.name.clone(),
                    value: s.clone(),
                },
                _ => mismatch(),
            }),
            _ => Err(mismatch()),
        }
    }

    /// 解析字符串字面量
    ///
    /// 事件中的字符串参数和促销规则里的取值都走这里。
    pub fn parse_literal(&self, raw: &str) -> Result<ParamValue, String> {
        let trimmed = raw.trim();
        match self.param_type {
            ParamType::Integer => trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
                .map(ParamValue::Int)
                .ok_or_else(|| format!("'{}' 不是整数", raw)),
            ParamType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ParamValue::Float)
                .ok_or_else(|| format!("'{}' 不是数值", raw)),
            ParamType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(ParamValue::Bool(true)),
                "false" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("'{}' 不是布尔值", raw)),
            },
            ParamType::Enum => {
                if self.options.iter().any(|o| o == trimmed) {
                    Ok(ParamValue::Str(trimmed.to_string()))
                } else {
                    Err(format!("'{}' 不在 {:?} 中", raw, self.options))
                }
            }
            ParamType::String => Ok(ParamValue::Str(raw.to_string())),
        }
    }
}

/// 整数值的浮点数转为 i64；超出 i64 范围的值不截断，视为类型不符
fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 事件类型定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventKindDef {
    pub id: String,
    pub label: String,
    pub category: EventCategory,
    pub params: Vec<ParamDef>,
    /// 作为触发金额的参数，同时也是该事件唯一的必填参数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_param: Option<String>,
}

impl EventKindDef {
    pub fn new(id: impl Into<String>, label: impl Into<String>, category: EventCategory) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category,
            params: Vec::new(),
            amount_param: None,
        }
    }

    pub fn param(mut self, def: ParamDef) -> Self {
        self.params.push(def);
        self
    }

    /// 声明金额参数（必填，浮点）
    pub fn amount(mut self, name: &str) -> Self {
        let mut def = ParamDef::float(name);
        def.required = true;
        self.params.push(def);
        self.amount_param = Some(name.to_string());
        self
    }

    pub fn find_param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// 事件模式注册表
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    kinds: BTreeMap<String, EventKindDef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置事件目录的注册表
    pub fn with_builtin_catalog() -> Self {
        let mut registry = Self::new();
        for kind in catalog::builtin_kinds() {
            registry.register(kind);
        }
        registry
    }

    /// 注册（或覆盖）事件类型
    pub fn register(&mut self, kind: EventKindDef) {
        self.kinds.insert(kind.id.clone(), kind);
    }

    pub fn kind(&self, id: &str) -> Option<&EventKindDef> {
        self.kinds.get(id)
    }

    pub fn param(&self, kind: &str, name: &str) -> Option<&ParamDef> {
        self.kind(kind).and_then(|k| k.find_param(name))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &EventKindDef> {
        self.kinds.values()
    }

    pub fn kinds_in(&self, category: EventCategory) -> Vec<&EventKindDef> {
        self.kinds
            .values()
            .filter(|k| k.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// 校验事件并强制转换参数
    ///
    /// 失败条件：事件类型未知、必填参数缺失、类型或枚举取值不匹配。
    /// 未声明的参数会被丢弃。
    pub fn validate(&self, event: &PlayerEvent) -> Result<ValidatedEvent, SchemaError> {
        if event.event_id.trim().is_empty() {
            return Err(SchemaError::InvalidField {
                field: "eventId".to_string(),
                message: "不能为空".to_string(),
            });
        }
        if event.player_id.trim().is_empty() {
            return Err(SchemaError::InvalidField {
                field: "playerId".to_string(),
                message: "不能为空".to_string(),
            });
        }
        if let Some(amount) = event.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(SchemaError::InvalidField {
                    field: "amount".to_string(),
                    message: format!("金额无效: {}", amount),
                });
            }
        }

        let kind = self
            .kind(&event.event_kind)
            .ok_or_else(|| SchemaError::UnknownEventKind(event.event_kind.clone()))?;

        let mut params = BTreeMap::new();
        for def in &kind.params {
            match event.params.get(&def.name) {
                Some(value) if !value.is_null() => {
                    params.insert(def.name.clone(), def.coerce(value)?);
                }
                _ if def.required => {
                    return Err(SchemaError::MissingParameter {
                        event_kind: kind.id.clone(),
                        param: def.name.clone(),
                    });
                }
                _ => {}
            }
        }

        for name in event.params.keys() {
            if kind.find_param(name).is_none() {
                debug!(
                    event_id = %event.event_id,
                    event_kind = %kind.id,
                    param = %name,
                    "丢弃未声明的事件参数"
                );
            }
        }

        let triggering_amount = event
            .amount
            .or_else(|| {
                kind.amount_param
                    .as_ref()
                    .and_then(|name| params.get(name))
                    .and_then(ParamValue::as_f64)
            })
            .unwrap_or(0.0);

        Ok(ValidatedEvent {
            event_id: event.event_id.clone(),
            player_id: event.player_id.clone(),
            event_kind: kind.id.clone(),
            timestamp: event.timestamp,
            params,
            triggering_amount,
            market: event.market.clone(),
            channel: event.channel.clone(),
            segments: event.segments.clone(),
        })
    }
}

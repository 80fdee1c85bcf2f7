//! 决策引擎错误类型
//!
//! 预期内的业务结果（不符合资格、账本拒绝）不是错误，以值的形式返回；
//! 这里只定义需要拒绝输入或向调用方暴露的故障。

use promo_shared::error::PromoError;
use thiserror::Error;

use crate::schema::ParamType;

/// 事件模式校验错误
///
/// 拒绝该事件并记录日志，不应重试。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("未知的事件类型: {0}")]
    UnknownEventKind(String),

    #[error("事件 {event_kind} 缺少必填参数: {param}")]
    MissingParameter { event_kind: String, param: String },

    #[error("参数 {param} 类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        param: String,
        expected: ParamType,
        actual: String,
    },

    #[error("参数 {param} 的取值 '{value}' 不在允许的枚举集合中")]
    InvalidEnumValue { param: String, value: String },

    #[error("事件字段无效: {field} - {message}")]
    InvalidField { field: String, message: String },
}

/// 促销定义编译错误
///
/// 在激活（加载）阶段把配置问题暴露出来，而不是留到事件评估时。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("促销定义字段缺失: {0}")]
    MissingField(String),

    #[error("触发器 {trigger_id} 引用了未知的事件类型: {event_kind}")]
    UnknownEventKind {
        trigger_id: String,
        event_kind: String,
    },

    #[error("事件 {event_kind} 不包含参数: {param}")]
    UnknownParameter { event_kind: String, param: String },

    #[error("规则参数 {param} 声明类型 {declared} 与事件模式类型 {schema} 不一致")]
    DeclaredTypeMismatch {
        param: String,
        declared: String,
        schema: ParamType,
    },

    #[error("无效的操作符: {0}")]
    UnknownOperator(String),

    #[error("操作符 {operator} 不支持类型 {value_type}")]
    InvalidOperator {
        operator: String,
        value_type: ParamType,
    },

    #[error("规则参数 {param} 的取值无效: '{value}' ({message})")]
    InvalidRuleValue {
        param: String,
        value: String,
        message: String,
    },

    #[error("字段 {field} 的取值无效: '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("排期无效: {0}")]
    InvalidSchedule(String),
}

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("促销不存在: {0}")]
    PromotionNotFound(String),

    #[error("促销已存在: {0}")]
    PromotionExists(String),

    #[error("促销 {promotion_id} 状态无法从 {from} 变更为 {to}")]
    InvalidTransition {
        promotion_id: String,
        from: String,
        to: String,
    },

    #[error("无效的预留请求: {0}")]
    InvalidReservation(String),

    #[error("账本不可用: {0}")]
    LedgerUnavailable(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Compile(_) => "COMPILE_ERROR",
            Self::PromotionNotFound(_) => "PROMOTION_NOT_FOUND",
            Self::PromotionExists(_) => "PROMOTION_EXISTS",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidReservation(_) => "INVALID_RESERVATION",
            Self::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 系统级故障由调用方的投递层重试，依靠 event_id 幂等保证安全
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable(_))
    }
}

impl From<EngineError> for PromoError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Schema(e) => PromoError::InvalidEvent(e.to_string()),
            EngineError::Compile(e) => PromoError::Validation(e.to_string()),
            EngineError::PromotionNotFound(id) => PromoError::NotFound {
                entity: "Promotion".to_string(),
                id,
            },
            EngineError::PromotionExists(id) => PromoError::AlreadyExists {
                entity: "Promotion".to_string(),
                id,
            },
            e @ EngineError::InvalidTransition { .. } => PromoError::Conflict(e.to_string()),
            EngineError::InvalidReservation(msg) => PromoError::Validation(msg),
            EngineError::LedgerUnavailable(msg) => PromoError::Unavailable(msg),
            EngineError::Json(e) => PromoError::Validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::from(SchemaError::UnknownEventKind("jackpot".to_string()));
        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert!(!err.is_retryable());

        let err = EngineError::LedgerUnavailable("lock poisoned".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_into_promo_error() {
        let err: PromoError = EngineError::PromotionNotFound("promo-1".to_string()).into();
        assert_eq!(err.code(), "NOT_FOUND");

        let err: PromoError = EngineError::LedgerUnavailable("down".to_string()).into();
        assert!(err.is_retryable());

        let err: PromoError = EngineError::from(SchemaError::MissingParameter {
            event_kind: "deposit".to_string(),
            param: "Amount".to_string(),
        })
        .into();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }
}

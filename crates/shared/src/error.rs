//! 统一错误处理模块
//!
//! 定义服务层共享的错误类型，使用 thiserror 提供良好的错误信息，
//! 并统一映射为 HTTP 状态码与 JSON 响应体。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// 服务层错误类型
#[derive(Debug, Error)]
pub enum PromoError {
    // ==================== 资源错误 ====================
    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} id={id}")]
    AlreadyExists { entity: String, id: String },

    #[error("状态冲突: {0}")]
    Conflict(String),

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    #[error("事件不符合模式: {0}")]
    InvalidEvent(String),

    // ==================== 系统错误 ====================
    #[error("依赖不可用: {0}")]
    Unavailable(String),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PromoError>;

impl PromoError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::InvalidEvent(_) => "SCHEMA_ERROR",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 仅系统级故障可重试，调用方依赖事件幂等保证重试安全
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidEvent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PromoError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Config(e) => {
                tracing::error!(error = %e, "配置错误");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<serde_json::Error> for PromoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON 处理错误: {}", err))
    }
}

//! 请求与响应 DTO 定义

use serde::{Deserialize, Serialize};

use crate::models::{PromotionStatus, RewardType};
use crate::risk::{RiskAssessment, RiskProfile};

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// 状态变更请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// 风险评估响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentDto {
    pub player_id: String,
    /// 是否为未上报画像时使用的中性基线
    pub baseline: bool,
    pub profile: RiskProfile,
    pub assessment: RiskAssessment,
}

/// 促销列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionSummaryDto {
    pub id: String,
    pub name: String,
    pub status: PromotionStatus,
    pub reward_type: RewardType,
    pub trigger_count: usize,
}

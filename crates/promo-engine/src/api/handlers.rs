//! API 处理器
//!
//! 处理器只做请求解析和结果包装，业务判断全部委托给 [`crate::engine::PromotionEngine`]。

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::info;

use promo_shared::error::PromoError;

use super::dto::{ApiResponse, PromotionSummaryDto, RiskAssessmentDto, UpdateStatusRequest};
use super::state::AppState;
use crate::compiler::PromotionCompiler;
use crate::error::EngineError;
use crate::ledger::LimitSnapshot;
use crate::models::{PlayerEvent, PromotionDefinition, PromotionOutcome, PromotionStatus};
use crate::risk::{RiskGatekeeper, RiskProfile};
use crate::schema::EventKindDef;
use crate::wizard::{PromotionDocument, WizardLimits};

type ApiResult<T> = Result<Json<ApiResponse<T>>, PromoError>;

// ==================== 促销管理 ====================

/// 编译并加载促销
///
/// POST /api/v1/promotions
pub async fn create_promotion(
    State(state): State<AppState>,
    Json(document): Json<PromotionDocument>,
) -> ApiResult<PromotionDefinition> {
    let definition = state.engine.load_document(&document)?;
    info!(promotion_id = %definition.id, status = %definition.status, "Promotion loaded");
    Ok(Json(ApiResponse::success(PromotionDefinition::clone(&definition))))
}

/// 促销列表
///
/// GET /api/v1/promotions
pub async fn list_promotions(State(state): State<AppState>) -> ApiResult<Vec<PromotionSummaryDto>> {
    let items = state
        .engine
        .promotions()
        .list_all()
        .iter()
        .map(|p| PromotionSummaryDto {
            id: p.id.clone(),
            name: p.name.clone(),
            status: p.status,
            reward_type: p.reward_type,
            trigger_count: p.triggers.len(),
        })
        .collect();
    Ok(Json(ApiResponse::success(items)))
}

/// 获取促销定义
///
/// GET /api/v1/promotions/{id}
pub async fn get_promotion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PromotionDefinition> {
    let definition = state
        .engine
        .promotions()
        .get(&id)
        .ok_or(EngineError::PromotionNotFound(id))?;
    Ok(Json(ApiResponse::success(PromotionDefinition::clone(&definition))))
}

/// 变更促销状态（暂停/恢复/结束）
///
/// PATCH /api/v1/promotions/{id}/status
pub async fn update_promotion_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<PromotionDefinition> {
    let status =
        PromotionStatus::parse_name(&req.status).ok_or_else(|| PromoError::InvalidArgument {
            field: "status".to_string(),
            message: format!("未知的促销状态: {}", req.status),
        })?;

    let definition = state.engine.update_status(&id, status)?;
    Ok(Json(ApiResponse::success(PromotionDefinition::clone(&definition))))
}

/// 调整额度
///
/// PUT /api/v1/promotions/{id}/limits
pub async fn update_promotion_limits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<WizardLimits>,
) -> ApiResult<PromotionDefinition> {
    let limits = PromotionCompiler::compile_limits(&req).map_err(EngineError::from)?;
    let definition = state.engine.update_limits(&id, limits)?;
    Ok(Json(ApiResponse::success(PromotionDefinition::clone(&definition))))
}

/// 账本快照
///
/// GET /api/v1/promotions/{id}/ledger
pub async fn get_promotion_ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<LimitSnapshot> {
    let snapshot = state.engine.limit_snapshot(&id)?;
    Ok(Json(ApiResponse::success(snapshot)))
}

// ==================== 风险画像 ====================

/// 写入玩家风险画像
///
/// PUT /api/v1/risk-profiles/{player_id}
pub async fn upsert_risk_profile(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Json(mut profile): Json<RiskProfile>,
) -> ApiResult<RiskProfile> {
    // 以路径中的玩家 ID 为准
    profile.player_id = player_id;
    state.engine.profiles().upsert(profile.clone());
    Ok(Json(ApiResponse::success(profile)))
}

/// 查询玩家当前风险评估
///
/// GET /api/v1/risk-profiles/{player_id}/assessment
pub async fn get_risk_assessment(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> ApiResult<RiskAssessmentDto> {
    let stored = state.engine.profiles().get(&player_id);
    let baseline = stored.is_none();
    let profile = stored.unwrap_or_else(|| RiskProfile::baseline(&player_id));
    let assessment = RiskGatekeeper::assess(&profile);

    Ok(Json(ApiResponse::success(RiskAssessmentDto {
        player_id,
        baseline,
        profile,
        assessment,
    })))
}

// ==================== 事件处理 ====================

/// 处理玩家事件
///
/// POST /api/v1/events
pub async fn process_event(
    State(state): State<AppState>,
    Json(event): Json<PlayerEvent>,
) -> ApiResult<Vec<PromotionOutcome>> {
    let outcomes = state.engine.handle_event(&event)?;
    Ok(Json(ApiResponse::success(outcomes)))
}

/// 事件模式目录
///
/// GET /api/v1/event-kinds
pub async fn list_event_kinds(State(state): State<AppState>) -> ApiResult<Vec<EventKindDef>> {
    let kinds = state.engine.registry().kinds().cloned().collect();
    Ok(Json(ApiResponse::success(kinds)))
}

/// 存活探针
///
/// GET /api/v1/health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "promo-engine",
        "promotions": state.engine.promotions().len(),
        "pendingAwards": state.engine.awards().pending().len(),
    }))
}

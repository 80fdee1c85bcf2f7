//! 促销决策引擎
//!
//! 串联各组件完成单个事件的处理：
//!
//! 1. 事件模式校验（失败直接拒绝，不重试）
//!    -> 2. 按 ID 顺序遍历生效促销 -> 3. 资格闸门（排期/受众/规则/风控）
//!    -> 4. 奖励计算 -> 5. 账本原子预留 -> 6. 创建并发布奖励
//!
//! 账本预留必须先于奖励创建：预留被拒时计算出的数值直接丢弃。
//! 账本不可用等系统级故障向调用方返回错误，由投递层重试。

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use promo_shared::observability::metrics;

use crate::compiler::PromotionCompiler;
use crate::eligibility::EligibilityGate;
use crate::emitter::{AwardEmitter, AwardPublisher, AwardStore};
use crate::error::{EngineError, Result};
use crate::ledger::{LimitLedger, LimitSnapshot, ReservationOutcome};
use crate::models::{
    EligibilityDecision, LimitConfig, OutcomeResult, PlayerEvent, PromotionDefinition,
    PromotionOutcome, PromotionStatus, RejectionReason, ValidatedEvent,
};
use crate::reward::RewardCalculator;
use crate::risk::{RiskProfile, RiskProfileStore};
use crate::schema::SchemaRegistry;
use crate::store::PromotionStore;
use crate::wizard::PromotionDocument;

/// 促销决策引擎
pub struct PromotionEngine {
    registry: Arc<SchemaRegistry>,
    compiler: PromotionCompiler,
    promotions: PromotionStore,
    ledger: Arc<dyn LimitLedger>,
    profiles: RiskProfileStore,
    emitter: AwardEmitter,
}

impl PromotionEngine {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        ledger: Arc<dyn LimitLedger>,
        publisher: Arc<dyn AwardPublisher>,
    ) -> Self {
        Self {
            compiler: PromotionCompiler::new(Arc::clone(&registry)),
            registry,
            promotions: PromotionStore::new(),
            ledger,
            profiles: RiskProfileStore::new(),
            emitter: AwardEmitter::new(AwardStore::new(), publisher),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn compiler(&self) -> &PromotionCompiler {
        &self.compiler
    }

    pub fn promotions(&self) -> &PromotionStore {
        &self.promotions
    }

    pub fn profiles(&self) -> &RiskProfileStore {
        &self.profiles
    }

    pub fn awards(&self) -> &AwardStore {
        self.emitter.store()
    }

    // ==================== 促销管理 ====================

    /// 加载已编译的促销定义并登记账本额度
    pub fn load_promotion(
        &self,
        definition: PromotionDefinition,
    ) -> Result<Arc<PromotionDefinition>> {
        let limits = definition.limits;
        let loaded = self.promotions.load(definition)?;
        self.ledger.register(&loaded.id, limits);
        Ok(loaded)
    }

    /// 编译向导文档并加载
    pub fn load_document(&self, document: &PromotionDocument) -> Result<Arc<PromotionDefinition>> {
        let definition = self.compiler.compile(document)?;
        self.load_promotion(definition)
    }

    pub fn update_status(
        &self,
        promotion_id: &str,
        status: PromotionStatus,
    ) -> Result<Arc<PromotionDefinition>> {
        self.promotions.update_status(promotion_id, status)
    }

    /// 调整额度：先更新账本，再替换定义快照
    pub fn update_limits(
        &self,
        promotion_id: &str,
        limits: LimitConfig,
    ) -> Result<Arc<PromotionDefinition>> {
        if !self.promotions.contains(promotion_id) {
            return Err(EngineError::PromotionNotFound(promotion_id.to_string()));
        }
        self.ledger.update_limits(promotion_id, limits)?;
        self.promotions.update_limits(promotion_id, limits)
    }

    pub fn limit_snapshot(&self, promotion_id: &str) -> Result<LimitSnapshot> {
        self.ledger.snapshot(promotion_id)
    }

    // ==================== 事件处理 ====================

    /// 使用存储中的风险画像处理事件，没有画像时按中性基线评估
    pub fn handle_event(&self, event: &PlayerEvent) -> Result<Vec<PromotionOutcome>> {
        let profile = self.profiles.get_or_baseline(&event.player_id);
        self.process_event(event, &profile)
    }

    /// 针对所有生效促销处理一个事件，每个促销返回一条结果
    #[instrument(
        skip_all,
        fields(
            event_id = %event.event_id,
            player_id = %event.player_id,
            event_kind = %event.event_kind,
        )
    )]
    pub fn process_event(
        &self,
        event: &PlayerEvent,
        profile: &RiskProfile,
    ) -> Result<Vec<PromotionOutcome>> {
        let start = Instant::now();

        let validated = self.validate(event, start)?;
        let outcomes = self
            .promotions
            .list_active()
            .iter()
            .map(|promotion| self.evaluate(promotion, &validated, profile))
            .collect::<Result<Vec<_>>>()?;

        let awarded = outcomes.iter().filter(|o| o.award().is_some()).count();
        let label = if awarded > 0 { "awarded" } else { "no_award" };
        metrics::record_event_processed(label, start.elapsed().as_secs_f64());

        info!(
            promotions = outcomes.len(),
            awarded,
            "事件处理完成"
        );
        Ok(outcomes)
    }

    /// 只针对指定促销处理事件
    #[instrument(
        skip(self, event, profile),
        fields(event_id = %event.event_id, player_id = %event.player_id)
    )]
    pub fn process_for_promotion(
        &self,
        promotion_id: &str,
        event: &PlayerEvent,
        profile: &RiskProfile,
    ) -> Result<PromotionOutcome> {
        let start = Instant::now();

        let promotion = self
            .promotions
            .get(promotion_id)
            .ok_or_else(|| EngineError::PromotionNotFound(promotion_id.to_string()))?;
        let validated = self.validate(event, start)?;
        let outcome = self.evaluate(&promotion, &validated, profile)?;

        metrics::record_event_processed(outcome.outcome_label(), start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// 重新发布待发布的奖励
    pub fn republish_pending(&self) -> usize {
        self.emitter.republish_pending()
    }

    fn validate(&self, event: &PlayerEvent, start: Instant) -> Result<ValidatedEvent> {
        self.registry.validate(event).map_err(|e| {
            info!(error = %e, "事件未通过模式校验，已拒绝");
            metrics::record_event_processed("schema_error", start.elapsed().as_secs_f64());
            EngineError::from(e)
        })
    }

    fn evaluate(
        &self,
        promotion: &PromotionDefinition,
        event: &ValidatedEvent,
        profile: &RiskProfile,
    ) -> Result<PromotionOutcome> {
        let decision = EligibilityGate::evaluate(event, promotion, profile);

        let (trigger_id, risk) = match &decision {
            EligibilityDecision::Eligible { trigger_id, risk } => (trigger_id.clone(), *risk),
            EligibilityDecision::NotEligible { reason } => {
                debug!(promotion_id = %promotion.id, reason = %reason, "不符合资格");
                metrics::record_not_eligible(reason.as_str());
                let result = OutcomeResult::NotEligible { reason: *reason };
                return Ok(PromotionOutcome {
                    promotion_id: promotion.id.clone(),
                    decision,
                    result,
                });
            }
        };

        let quote = match RewardCalculator::calculate(promotion, event, risk.action) {
            Ok(quote) => quote,
            Err(reason) => {
                debug!(promotion_id = %promotion.id, reason = %reason, "奖励计算未产出");
                metrics::record_not_eligible(reason.as_str());
                return Ok(PromotionOutcome {
                    promotion_id: promotion.id.clone(),
                    decision,
                    result: OutcomeResult::NotEligible { reason },
                });
            }
        };

        let result = match self.ledger.try_reserve(
            &promotion.id,
            &event.player_id,
            &event.event_id,
            quote.value,
        )? {
            ReservationOutcome::Reserved(reservation) => {
                let award =
                    self.emitter
                        .emit(&reservation, promotion, &trigger_id, &quote, risk.action);
                metrics::record_award(&promotion.id);
                OutcomeResult::Awarded { award }
            }
            ReservationOutcome::Rejected(reason) => {
                if reason == RejectionReason::DuplicateEvent {
                    info!(promotion_id = %promotion.id, "重复事件，幂等忽略");
                } else {
                    debug!(promotion_id = %promotion.id, reason = %reason, "账本拒绝");
                }
                metrics::record_ledger_rejection(reason.as_str());
                OutcomeResult::Rejected { reason }
            }
        };

        Ok(PromotionOutcome {
            promotion_id: promotion.id.clone(),
            decision,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::MockAwardPublisher;
    use crate::ledger::InMemoryLedger;
    use crate::models::{
        Audience, NotEligibleReason, ParamValue, RewardConfig, RewardType, Rule, RuleValue,
        Schedule, SimpleConfig, Trigger,
    };
    use crate::operators::Operator;
    use crate::risk::RiskAction;
    use crate::schema::ParamType;
    use chrono::{TimeZone, Utc};

    fn engine_with(publisher: MockAwardPublisher) -> PromotionEngine {
        PromotionEngine::new(
            Arc::new(SchemaRegistry::with_builtin_catalog()),
            Arc::new(InMemoryLedger::default()),
            Arc::new(publisher),
        )
    }

    fn accepting_publisher() -> MockAwardPublisher {
        let mut publisher = MockAwardPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));
        publisher
    }

    fn deposit_cashback(id: &str, budget: Option<f64>) -> PromotionDefinition {
        PromotionDefinition {
            id: id.to_string(),
            name: "Deposit Cashback".to_string(),
            description: String::new(),
            promotion_type: "cashback".to_string(),
            reward_type: RewardType::Cashback,
            audience: Audience::default(),
            triggers: vec![Trigger {
                id: "deposit-50".to_string(),
                event_kind: "deposit".to_string(),
                rules: vec![Rule::new(
                    "Amount",
                    Operator::Gte,
                    ParamType::Float,
                    RuleValue::Scalar(ParamValue::Float(50.0)),
                )],
            }],
            reward: RewardConfig::Simple(SimpleConfig {
                percentage: 10.0,
                cap: Some(100.0),
            }),
            wagering_multiplier: None,
            credit_timing: "instant".to_string(),
            high_risk: false,
            limits: LimitConfig {
                total_claims_cap: None,
                per_player_cap: 5,
                budget_cap: budget,
            },
            schedule: Schedule::default(),
            status: PromotionStatus::Active,
        }
    }

    fn deposit(event_id: &str, amount: f64) -> PlayerEvent {
        PlayerEvent::new(
            event_id,
            "player-1",
            "deposit",
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        )
        .with_param("Amount", amount)
    }

    #[test]
    fn test_award_flow() {
        let engine = engine_with(accepting_publisher());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();

        let outcomes = engine
            .process_event(&deposit("evt-1", 200.0), &RiskProfile::baseline("player-1"))
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        let award = outcomes[0].award().unwrap();
        assert_eq!(award.value, 20.0);
        assert_eq!(award.trigger_id, "deposit-50");
        assert_eq!(award.risk_action, RiskAction::Allow);
        assert_eq!(engine.awards().len(), 1);
    }

    #[test]
    fn test_replayed_event_awards_once() {
        let engine = engine_with(accepting_publisher());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();
        let profile = RiskProfile::baseline("player-1");

        engine.process_event(&deposit("evt-1", 200.0), &profile).unwrap();
        let outcomes = engine.process_event(&deposit("evt-1", 200.0), &profile).unwrap();

        assert_eq!(
            outcomes[0].result,
            OutcomeResult::Rejected {
                reason: RejectionReason::DuplicateEvent
            }
        );
        assert_eq!(engine.awards().len(), 1);
        assert_eq!(engine.limit_snapshot("promo-1").unwrap().total_claims, 1);
    }

    #[test]
    fn test_budget_rejection_discards_value() {
        let mut publisher = MockAwardPublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));
        let engine = engine_with(publisher);
        engine
            .load_promotion(deposit_cashback("promo-1", Some(25.0)))
            .unwrap();
        let profile = RiskProfile::baseline("player-1");

        engine.process_event(&deposit("evt-1", 200.0), &profile).unwrap();
        let outcomes = engine.process_event(&deposit("evt-2", 200.0), &profile).unwrap();

        assert_eq!(
            outcomes[0].result,
            OutcomeResult::Rejected {
                reason: RejectionReason::BudgetExhausted
            }
        );
        assert!(engine.awards().get("promo-1", "evt-2").is_none());
    }

    #[test]
    fn test_schema_error_is_surfaced() {
        let engine = engine_with(MockAwardPublisher::new());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();

        let event = PlayerEvent::new("evt-1", "player-1", "deposit", Utc::now());
        let result = engine.process_event(&event, &RiskProfile::baseline("player-1"));
        assert!(matches!(result, Err(EngineError::Schema(_))));
    }

    #[test]
    fn test_not_eligible_outcome() {
        let engine = engine_with(MockAwardPublisher::new());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();

        let outcome = engine
            .process_for_promotion(
                "promo-1",
                &deposit("evt-1", 10.0),
                &RiskProfile::baseline("player-1"),
            )
            .unwrap();
        assert_eq!(
            outcome.decision,
            EligibilityDecision::NotEligible {
                reason: NotEligibleReason::NoRuleMatch
            }
        );
        assert_eq!(outcome.outcome_label(), "not_eligible");
    }

    #[test]
    fn test_paused_promotion_is_skipped() {
        let engine = engine_with(MockAwardPublisher::new());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();
        engine.update_status("promo-1", PromotionStatus::Paused).unwrap();

        let outcomes = engine
            .process_event(&deposit("evt-1", 200.0), &RiskProfile::baseline("player-1"))
            .unwrap();
        assert!(outcomes.is_empty());

        let outcome = engine
            .process_for_promotion(
                "promo-1",
                &deposit("evt-1", 200.0),
                &RiskProfile::baseline("player-1"),
            )
            .unwrap();
        assert_eq!(
            outcome.result,
            OutcomeResult::NotEligible {
                reason: NotEligibleReason::OutOfSchedule
            }
        );
    }

    #[test]
    fn test_handle_event_uses_stored_profile() {
        let engine = engine_with(MockAwardPublisher::new());
        engine.load_promotion(deposit_cashback("promo-1", None)).unwrap();
        engine.profiles().upsert(RiskProfile {
            player_id: "player-1".to_string(),
            loss_ratio_7d: 0.72,
            deposit_burst_24h: 5,
            avg_session_minutes: 45.0,
            hours_since_last_loss: Some(2.0),
        });

        let outcomes = engine.handle_event(&deposit("evt-1", 200.0)).unwrap();
        assert_eq!(
            outcomes[0].result,
            OutcomeResult::NotEligible {
                reason: NotEligibleReason::RiskBlocked
            }
        );
    }

    #[test]
    fn test_activating_draft_applies_new_limits() {
        let engine = engine_with(accepting_publisher());
        let mut draft = deposit_cashback("promo-1", None);
        draft.status = PromotionStatus::Draft;
        draft.limits.per_player_cap = 1;
        engine.load_promotion(draft).unwrap();

        let mut active = deposit_cashback("promo-1", Some(50.0));
        active.limits.per_player_cap = 3;
        engine.load_promotion(active).unwrap();

        let snapshot = engine.limit_snapshot("promo-1").unwrap();
        let stored = engine.promotions().get("promo-1").unwrap();
        assert_eq!(snapshot.limits, stored.limits);

        let profile = RiskProfile::baseline("player-1");
        let results: Vec<OutcomeResult> = ["evt-1", "evt-2", "evt-3"]
            .iter()
            .map(|id| {
                engine.process_event(&deposit(id, 200.0), &profile).unwrap()[0]
                    .result
                    .clone()
            })
            .collect();

        // 每笔 20，预算 50：前两笔发放，第三笔超预算
        assert!(matches!(results[0], OutcomeResult::Awarded { .. }));
        assert!(matches!(results[1], OutcomeResult::Awarded { .. }));
        assert_eq!(
            results[2],
            OutcomeResult::Rejected {
                reason: RejectionReason::BudgetExhausted
            }
        );
        assert_eq!(engine.limit_snapshot("promo-1").unwrap().budget_consumed, 40.0);
    }

    #[test]
    fn test_reload_after_remove_applies_new_limits() {
        let engine = engine_with(accepting_publisher());
        let mut first = deposit_cashback("promo-1", None);
        first.limits.per_player_cap = 1;
        engine.load_promotion(first).unwrap();
        let profile = RiskProfile::baseline("player-1");
        engine.process_event(&deposit("evt-1", 200.0), &profile).unwrap();

        engine.promotions().remove("promo-1").unwrap();
        let mut reloaded = deposit_cashback("promo-1", None);
        reloaded.limits.per_player_cap = 3;
        engine.load_promotion(reloaded).unwrap();

        let snapshot = engine.limit_snapshot("promo-1").unwrap();
        assert_eq!(snapshot.limits.per_player_cap, 3);
        assert_eq!(snapshot.total_claims, 1);

        let outcomes = engine.process_event(&deposit("evt-2", 200.0), &profile).unwrap();
        assert!(outcomes[0].award().is_some());
        // 已发放的事件仍然幂等
        let outcomes = engine.process_event(&deposit("evt-1", 200.0), &profile).unwrap();
        assert_eq!(
            outcomes[0].result,
            OutcomeResult::Rejected {
                reason: RejectionReason::DuplicateEvent
            }
        );
    }

    #[test]
    fn test_update_limits_unknown_promotion() {
        let engine = engine_with(MockAwardPublisher::new());
        assert!(matches!(
            engine.update_limits("missing", LimitConfig::default()),
            Err(EngineError::PromotionNotFound(_))
        ));
    }
}

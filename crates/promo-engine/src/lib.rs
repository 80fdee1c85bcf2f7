//! 促销决策引擎
//!
//! 根据玩家行为事件和促销定义，判定促销是否触发、计算奖励，
//! 并对领取次数和预算做一次且仅一次的原子扣减。
//!
//! # 核心组件
//!
//! - `schema`: 事件模式注册表，校验并强制转换事件参数
//! - `evaluator`: 规则评估器（触发器内合取，触发器间析取、首个命中生效）
//! - `risk`: 负责任博彩风控评分（ALLOW / DOWNGRADE / BLOCK）
//! - `eligibility`: 资格闸门
//! - `ledger`: 额度与预算账本
//! - `reward`: 奖励计算（固定比例 / 分档矩阵）
//! - `emitter`: 奖励创建与发布
//! - `compiler`: 向导文档编译
//! - `engine`: 串联以上组件的决策引擎
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use promo_engine::{ChannelPublisher, InMemoryLedger, PromotionEngine, SchemaRegistry};
//! use std::sync::Arc;
//!
//! let (publisher, awards) = ChannelPublisher::new(1024);
//! let engine = PromotionEngine::new(
//!     Arc::new(SchemaRegistry::with_builtin_catalog()),
//!     Arc::new(InMemoryLedger::default()),
//!     Arc::new(publisher),
//! );
//! engine.load_document(&document)?;
//! let outcomes = engine.handle_event(&event)?;
//! ```

pub mod api;
pub mod compiler;
pub mod eligibility;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod models;
pub mod operators;
pub mod reward;
pub mod risk;
pub mod schema;
pub mod store;
pub mod wizard;

pub use compiler::PromotionCompiler;
pub use eligibility::EligibilityGate;
pub use emitter::{AwardEmitter, AwardPublisher, AwardStore, ChannelPublisher, PublishError};
pub use engine::PromotionEngine;
pub use error::{CompileError, EngineError, Result, SchemaError};
pub use evaluator::RuleEvaluator;
pub use ledger::{InMemoryLedger, LimitLedger, LimitSnapshot, Reservation, ReservationOutcome};
pub use models::*;
pub use operators::Operator;
pub use reward::{RewardCalculator, RewardQuote};
pub use risk::{RiskAction, RiskAssessment, RiskGatekeeper, RiskProfile, RiskProfileStore};
pub use schema::{EventCategory, EventKindDef, ParamDef, ParamType, SchemaRegistry};
pub use store::PromotionStore;
pub use wizard::PromotionDocument;

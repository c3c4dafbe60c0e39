//! 游戏化规则与任务评估引擎
//!
//! 给定一个用户动作事件（建行程、签到、下单……），决定哪些奖励
//! （经验值、金币）、徽章、成就与多步任务推进应该触发，并以幂等、
//! 恰好一次的方式持久化发放结果。提供：
//! - 结构化条件谓词语言与纯函数评估器
//! - 按优先级排序、非排他的规则匹配
//! - 多步任务状态机（步骤推进与完成奖励）
//! - 以唯一性约束为锚点的幂等奖励发放
//! - 按用户串行化的并发控制

pub mod condition;
pub mod counts;
pub mod engine;
pub mod legacy;
pub mod lock;
pub mod matcher;
pub mod models;
pub mod quest;
pub mod rewards;
pub mod store;

pub use condition::{Condition, ConditionEvaluator, CountField, EventContext, Operator};
pub use counts::CountAggregator;
pub use engine::GamificationEngine;
pub use legacy::LegacyBadgeEvaluator;
pub use lock::SubjectLockManager;
pub use matcher::{MatchOutcome, RuleMatcher};
pub use models::{
    Achievement, Badge, LedgerEntry, Quest, QuestStatus, QuestStep, RewardAmount, Rule,
    SubjectRewards, UserAchievement, UserBadge, UserQuest,
};
pub use quest::QuestProgressor;
pub use rewards::{RewardGranter, level_for_xp};
pub use store::{GamificationStore, InsertOutcome, memory::MemoryStore};

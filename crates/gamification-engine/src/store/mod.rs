//! 数据访问接口
//!
//! 定义引擎消费的存储抽象，便于引擎依赖抽象而非具体实现，支持 mock 测试。
//! 存储技术本身是外部协作方：生产环境由持久化层实现此 trait，
//! 测试与本地开发使用内存实现（见 memory 模块）。

use async_trait::async_trait;

use wayfarer_shared::error::Result;
use wayfarer_shared::events::TriggerEvent;

use crate::condition::CountField;
use crate::models::{
    Achievement, Badge, LedgerEntry, Quest, RewardAmount, Rule, SubjectRewards, UserAchievement,
    UserBadge, UserQuest,
};

pub mod memory;

/// 唯一性插入的结果
///
/// 唯一性冲突是正常数据流而非错误：重复插入表示"已发放"，
/// 调用方据此跳过而不是报错。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// 游戏化引擎存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GamificationStore: Send + Sync {
    // 规则
    /// 按触发事件取活跃规则，按优先级降序排列（同优先级按 id 升序，
    /// 即插入顺序，保证稳定确定的评估次序）
    async fn active_rules_for_event(&self, event: TriggerEvent) -> Result<Vec<Rule>>;

    // 历史计数
    async fn count_for_subject(&self, field: CountField, subject_id: &str) -> Result<i64>;

    // 徽章
    async fn get_badge(&self, badge_id: i64) -> Result<Option<Badge>>;
    async fn list_badges(&self) -> Result<Vec<Badge>>;
    async fn has_badge(&self, subject_id: &str, badge_id: i64) -> Result<bool>;
    /// 插入用户徽章记录，(subject_id, badge_id) 唯一性冲突返回 `Duplicate`
    async fn insert_user_badge(&self, grant: &UserBadge) -> Result<InsertOutcome>;
    async fn badges_for_subject(&self, subject_id: &str) -> Result<Vec<UserBadge>>;

    // 成就
    async fn get_achievement(&self, achievement_id: i64) -> Result<Option<Achievement>>;
    async fn has_achievement(&self, subject_id: &str, achievement_id: i64) -> Result<bool>;
    async fn insert_user_achievement(&self, grant: &UserAchievement) -> Result<InsertOutcome>;

    // 任务
    async fn get_quest(&self, quest_id: i64) -> Result<Option<Quest>>;
    /// 取用户所有进行中的任务进度
    async fn in_progress_quests(&self, subject_id: &str) -> Result<Vec<UserQuest>>;
    async fn save_user_quest(&self, user_quest: &UserQuest) -> Result<()>;

    // 奖励
    /// 追加一条账本记录并原子递增用户聚合 XP/金币（等级随 XP 重算）。
    /// 所有奖励变更必须经过此单一入口，禁止调用方读-改-写聚合值。
    async fn grant_rewards(
        &self,
        subject_id: &str,
        amount: RewardAmount,
        reason: &str,
    ) -> Result<SubjectRewards>;
    async fn rewards_for_subject(&self, subject_id: &str) -> Result<SubjectRewards>;
    async fn ledger_for_subject(&self, subject_id: &str) -> Result<Vec<LedgerEntry>>;
}

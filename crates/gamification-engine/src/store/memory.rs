//! 内存存储
//!
//! 使用 DashMap 实现的高并发内存存储，适用于测试和本地开发环境。
//! 每个用户的奖励聚合单独用一把互斥锁保护，保证"账本追加 + 聚合递增"
//! 在没有引擎级用户锁的情况下也是原子的。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use wayfarer_shared::error::Result;
use wayfarer_shared::events::TriggerEvent;

use crate::condition::CountField;
use crate::models::{
    Achievement, Badge, LedgerEntry, Quest, RewardAmount, Rule, SubjectRewards, UserAchievement,
    UserBadge, UserQuest,
};
use crate::rewards::level_for_xp;
use crate::store::{GamificationStore, InsertOutcome};

/// 用户奖励单元：聚合值与账本同锁保护
#[derive(Debug, Default)]
struct RewardCell {
    totals: SubjectRewards,
    ledger: Vec<LedgerEntry>,
}

/// 内存存储实现
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: DashMap<i64, Rule>,
    badges: DashMap<i64, Badge>,
    achievements: DashMap<i64, Achievement>,
    quests: DashMap<i64, Quest>,
    user_badges: DashMap<(String, i64), UserBadge>,
    user_achievements: DashMap<(String, i64), UserAchievement>,
    user_quests: DashMap<(String, i64), UserQuest>,
    activity_counts: DashMap<(String, CountField), i64>,
    rewards: DashMap<String, Arc<Mutex<RewardCell>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 数据播种（替代引擎范围外的管理面） ====================

    pub fn seed_rule(&self, rule: Rule) {
        self.rules.insert(rule.id, rule);
    }

    pub fn seed_badge(&self, badge: Badge) {
        self.badges.insert(badge.id, badge);
    }

    pub fn seed_achievement(&self, achievement: Achievement) {
        self.achievements.insert(achievement.id, achievement);
    }

    pub fn seed_quest(&self, quest: Quest) {
        self.quests.insert(quest.id, quest);
    }

    /// 外部"开始任务"动作：创建初始进度行（第 1 步，空进度表）。
    /// 已存在的行保持不变（完成的任务不可重入）。
    pub fn start_quest(&self, subject_id: &str, quest_id: i64) {
        self.user_quests
            .entry((subject_id.to_string(), quest_id))
            .or_insert_with(|| UserQuest::start(subject_id, quest_id));
    }

    /// 累加用户历史行为计数（签到数、行程数等），供计数条件查询
    pub fn record_activity(&self, subject_id: &str, field: CountField, count: i64) {
        *self
            .activity_counts
            .entry((subject_id.to_string(), field))
            .or_insert(0) += count;
    }

    /// 取用户任务进度（测试断言用）
    pub fn user_quest(&self, subject_id: &str, quest_id: i64) -> Option<UserQuest> {
        self.user_quests
            .get(&(subject_id.to_string(), quest_id))
            .map(|v| v.clone())
    }

    fn reward_cell(&self, subject_id: &str) -> Arc<Mutex<RewardCell>> {
        self.rewards
            .entry(subject_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl GamificationStore for MemoryStore {
    async fn active_rules_for_event(&self, event: TriggerEvent) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.trigger == event && r.is_active)
            .map(|r| r.clone())
            .collect();

        // 优先级降序，同优先级按 id 升序保证确定性
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn count_for_subject(&self, field: CountField, subject_id: &str) -> Result<i64> {
        Ok(self
            .activity_counts
            .get(&(subject_id.to_string(), field))
            .map(|v| *v)
            .unwrap_or(0))
    }

    async fn get_badge(&self, badge_id: i64) -> Result<Option<Badge>> {
        Ok(self.badges.get(&badge_id).map(|v| v.clone()))
    }

    async fn list_badges(&self) -> Result<Vec<Badge>> {
        let mut badges: Vec<Badge> = self.badges.iter().map(|v| v.clone()).collect();
        badges.sort_by_key(|b| b.id);
        Ok(badges)
    }

    async fn has_badge(&self, subject_id: &str, badge_id: i64) -> Result<bool> {
        Ok(self
            .user_badges
            .contains_key(&(subject_id.to_string(), badge_id)))
    }

    async fn insert_user_badge(&self, grant: &UserBadge) -> Result<InsertOutcome> {
        // entry 持有分片锁，检查与插入是原子的
        match self
            .user_badges
            .entry((grant.subject_id.clone(), grant.badge_id))
        {
            dashmap::Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            dashmap::Entry::Vacant(v) => {
                v.insert(grant.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn badges_for_subject(&self, subject_id: &str) -> Result<Vec<UserBadge>> {
        let mut grants: Vec<UserBadge> = self
            .user_badges
            .iter()
            .filter(|entry| entry.key().0 == subject_id)
            .map(|entry| entry.value().clone())
            .collect();
        grants.sort_by_key(|g| g.badge_id);
        Ok(grants)
    }

    async fn get_achievement(&self, achievement_id: i64) -> Result<Option<Achievement>> {
        Ok(self.achievements.get(&achievement_id).map(|v| v.clone()))
    }

    async fn has_achievement(&self, subject_id: &str, achievement_id: i64) -> Result<bool> {
        Ok(self
            .user_achievements
            .contains_key(&(subject_id.to_string(), achievement_id)))
    }

    async fn insert_user_achievement(&self, grant: &UserAchievement) -> Result<InsertOutcome> {
        match self
            .user_achievements
            .entry((grant.subject_id.clone(), grant.achievement_id))
        {
            dashmap::Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            dashmap::Entry::Vacant(v) => {
                v.insert(grant.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn get_quest(&self, quest_id: i64) -> Result<Option<Quest>> {
        Ok(self.quests.get(&quest_id).map(|v| v.clone()))
    }

    async fn in_progress_quests(&self, subject_id: &str) -> Result<Vec<UserQuest>> {
        use crate::models::QuestStatus;

        let mut quests: Vec<UserQuest> = self
            .user_quests
            .iter()
            .filter(|entry| {
                entry.key().0 == subject_id && entry.value().status == QuestStatus::InProgress
            })
            .map(|entry| entry.value().clone())
            .collect();
        quests.sort_by_key(|q| q.quest_id);
        Ok(quests)
    }

    async fn save_user_quest(&self, user_quest: &UserQuest) -> Result<()> {
        self.user_quests.insert(
            (user_quest.subject_id.clone(), user_quest.quest_id),
            user_quest.clone(),
        );
        Ok(())
    }

    async fn grant_rewards(
        &self,
        subject_id: &str,
        amount: RewardAmount,
        reason: &str,
    ) -> Result<SubjectRewards> {
        let cell = self.reward_cell(subject_id);
        let mut cell = cell.lock();

        cell.totals.xp += amount.xp;
        cell.totals.coins += amount.coins;
        cell.totals.level = level_for_xp(cell.totals.xp);
        cell.ledger.push(LedgerEntry {
            subject_id: subject_id.to_string(),
            amount,
            reason: reason.to_string(),
            created_at: Utc::now(),
        });

        Ok(cell.totals)
    }

    async fn rewards_for_subject(&self, subject_id: &str) -> Result<SubjectRewards> {
        Ok(self
            .rewards
            .get(subject_id)
            .map(|cell| cell.lock().totals)
            .unwrap_or_default())
    }

    async fn ledger_for_subject(&self, subject_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .rewards
            .get(subject_id)
            .map(|cell| cell.lock().ledger.clone())
            .unwrap_or_default())
    }
}

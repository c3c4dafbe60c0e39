//! 幂等奖励发放
//!
//! 徽章/成就发放以 (用户, 徽章) 唯一性约束为幂等锚点：重复插入被视为
//! "已发放"而静默跳过，绝不二次计入 XP。XP/金币/等级的所有变更都经过
//! 存储层的单一原子"账本追加 + 聚合递增"入口。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use wayfarer_shared::error::Result;
use wayfarer_shared::events::GrantedBadge;

use crate::models::{Badge, RewardAmount, SubjectRewards, UserBadge};
use crate::store::GamificationStore;

/// XP -> 等级换算
///
/// 纯函数且全定义域：每 100 XP 开方取整进一级。
/// 单调不减，XP 永不扣减，因此等级也永不回退。
pub fn level_for_xp(xp: i64) -> i32 {
    (xp.max(0) / 100).isqrt() as i32 + 1
}

/// 奖励发放器
pub struct RewardGranter<S> {
    store: Arc<S>,
}

impl<S> Clone for RewardGranter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GamificationStore> RewardGranter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 发放徽章
    ///
    /// 依赖唯一性约束做幂等：重复发放返回 `None` 且不计 XP。
    /// 插入成功且徽章自带 XP 时，以 `"Badge Earned: <name>"` 入账。
    /// 插入因非唯一性冲突的原因失败时，徽章视为未发放，XP 不应用。
    pub async fn award_badge(
        &self,
        subject_id: &str,
        badge: &Badge,
    ) -> Result<Option<GrantedBadge>> {
        let grant = UserBadge {
            subject_id: subject_id.to_string(),
            badge_id: badge.id,
            granted_at: Utc::now(),
        };

        if !self.store.insert_user_badge(&grant).await?.is_inserted() {
            debug!(
                subject_id = %subject_id,
                badge_id = badge.id,
                "徽章已持有，跳过发放"
            );
            return Ok(None);
        }

        if badge.xp_value > 0 {
            self.grant_rewards(
                subject_id,
                RewardAmount::new(badge.xp_value, 0),
                &format!("Badge Earned: {}", badge.name),
            )
            .await?;
        }

        info!(
            subject_id = %subject_id,
            badge_id = badge.id,
            badge_name = %badge.name,
            xp_value = badge.xp_value,
            "徽章发放成功"
        );

        Ok(Some(GrantedBadge {
            badge_id: badge.id,
            badge_name: badge.name.clone(),
            xp_value: badge.xp_value,
        }))
    }

    /// 发放 XP/金币奖励
    ///
    /// 本调用自身没有幂等键；调用方（规则匹配器、任务状态机、徽章发放）
    /// 负责通过各自的唯一性预检保证每个逻辑原因至多调用一次。
    pub async fn grant_rewards(
        &self,
        subject_id: &str,
        amount: RewardAmount,
        reason: &str,
    ) -> Result<SubjectRewards> {
        let totals = self.store.grant_rewards(subject_id, amount, reason).await?;

        debug!(
            subject_id = %subject_id,
            xp = amount.xp,
            coins = amount.coins,
            reason = %reason,
            new_level = totals.level,
            "奖励已入账"
        );

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn badge(id: i64, name: &str, xp_value: i64) -> Badge {
        Badge {
            id,
            name: name.to_string(),
            xp_value,
            criteria: json!(null),
        }
    }

    #[test]
    fn test_level_curve_monotonic() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(900), 4);

        // 负值防御（XP 不应为负，但函数必须全定义域）
        assert_eq!(level_for_xp(-50), 1);

        // 单调性抽查
        let mut prev = 0;
        for xp in (0..10_000).step_by(37) {
            let level = level_for_xp(xp);
            assert!(level >= prev);
            prev = level;
        }
    }

    #[tokio::test]
    async fn test_award_badge_once() {
        let store = Arc::new(MemoryStore::new());
        let granter = RewardGranter::new(store.clone());
        let badge = badge(1, "首次签到", 25);

        let granted = granter.award_badge("user-001", &badge).await.unwrap();
        assert!(granted.is_some());
        assert_eq!(granted.unwrap().badge_name, "首次签到");

        let totals = store.rewards_for_subject("user-001").await.unwrap();
        assert_eq!(totals.xp, 25);

        let ledger = store.ledger_for_subject("user-001").await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].reason, "Badge Earned: 首次签到");
    }

    #[tokio::test]
    async fn test_award_badge_duplicate_no_double_xp() {
        let store = Arc::new(MemoryStore::new());
        let granter = RewardGranter::new(store.clone());
        let badge = badge(1, "首次签到", 25);

        assert!(granter.award_badge("user-001", &badge).await.unwrap().is_some());
        // 第二次发放：静默跳过，不计 XP
        assert!(granter.award_badge("user-001", &badge).await.unwrap().is_none());

        let totals = store.rewards_for_subject("user-001").await.unwrap();
        assert_eq!(totals.xp, 25);
        assert_eq!(store.ledger_for_subject("user-001").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_xp_badge_produces_no_ledger_entry() {
        let store = Arc::new(MemoryStore::new());
        let granter = RewardGranter::new(store.clone());
        let badge = badge(2, "纪念徽章", 0);

        assert!(granter.award_badge("user-001", &badge).await.unwrap().is_some());
        assert!(store.ledger_for_subject("user-001").await.unwrap().is_empty());
    }
}

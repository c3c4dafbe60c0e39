//! 规则匹配器
//!
//! 按优先级降序逐条评估激活规则。优先级只决定顺序，不做互斥：
//! 一个事件可以触发多条规则，高优先级命中不会抑制低优先级规则。
//! 单条规则失败只记录、不中断兄弟规则的评估。

use std::sync::Arc;

use tracing::{debug, info, warn};

use wayfarer_shared::error::Result;
use wayfarer_shared::events::{EngineResult, GameEvent, GrantedAchievement};

use crate::condition::{Condition, ConditionEvaluator, EventContext};
use crate::counts::CountAggregator;
use crate::models::{Rule, UserAchievement};
use crate::rewards::RewardGranter;
use crate::store::GamificationStore;

/// 匹配结果
///
/// `NoActiveRules` 表示该事件类型根本没有配置激活规则，与
/// "有规则但全部未命中"（`Evaluated` 且无任何发放）是两种不同状态。
/// 只有前者会触发旧版徽章回退评估。
#[derive(Debug)]
pub enum MatchOutcome {
    /// 该事件类型没有任何激活规则
    NoActiveRules,
    /// 规则已逐条评估，结果（可能为空）在内
    Evaluated(EngineResult),
}

/// 规则匹配器
pub struct RuleMatcher<S> {
    store: Arc<S>,
    granter: RewardGranter<S>,
    aggregator: CountAggregator<S>,
}

impl<S: GamificationStore> RuleMatcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            granter: RewardGranter::new(Arc::clone(&store)),
            aggregator: CountAggregator::new(Arc::clone(&store)),
            store,
        }
    }

    /// 对单个事件评估全部激活规则
    pub async fn evaluate(&self, event: &GameEvent) -> Result<MatchOutcome> {
        let rules = self.store.active_rules_for_event(event.trigger).await?;
        if rules.is_empty() {
            debug!(
                trigger = %event.trigger,
                "该事件类型无激活规则"
            );
            return Ok(MatchOutcome::NoActiveRules);
        }

        let ctx = EventContext::new(event.context.clone());
        let mut result = EngineResult::default();

        for rule in &rules {
            if let Err(e) = self.apply_rule(rule, event, &ctx, &mut result).await {
                // 单条规则失败不影响其余规则
                warn!(
                    rule_id = rule.id,
                    rule_name = %rule.name,
                    error = %e,
                    "规则执行失败，继续评估后续规则"
                );
                result
                    .errors
                    .push(format!("rule {} ({}) failed: {}", rule.id, rule.name, e));
            }
        }

        Ok(MatchOutcome::Evaluated(result))
    }

    /// 评估并执行单条规则
    ///
    /// 规则已持有其徽章/成就的用户整条跳过，XP 也不重复计入。
    async fn apply_rule(
        &self,
        rule: &Rule,
        event: &GameEvent,
        ctx: &EventContext,
        result: &mut EngineResult,
    ) -> Result<()> {
        let subject_id = event.subject_id.as_str();
        let condition = Condition::parse(&rule.condition);

        let satisfied = match &condition {
            Condition::Count {
                field,
                operator,
                value,
            } => {
                self.aggregator
                    .satisfies(subject_id, *field, *operator, *value)
                    .await?
            }
            other => ConditionEvaluator::evaluate(other, ctx),
        };

        if !satisfied {
            debug!(rule_id = rule.id, "条件未满足，规则跳过");
            return Ok(());
        }

        // 幂等预检：已持有徽章/成就的规则整条跳过
        if let Some(badge_id) = rule.badge_id
            && self.store.has_badge(subject_id, badge_id).await?
        {
            debug!(rule_id = rule.id, badge_id, "徽章已持有，规则跳过");
            return Ok(());
        }
        if let Some(achievement_id) = rule.achievement_id
            && self.store.has_achievement(subject_id, achievement_id).await?
        {
            debug!(rule_id = rule.id, achievement_id, "成就已持有，规则跳过");
            return Ok(());
        }

        let reward = rule.reward();
        if !reward.is_zero() {
            self.granter
                .grant_rewards(subject_id, reward, &format!("Rule: {}", rule.name))
                .await?;
        }

        if let Some(badge_id) = rule.badge_id
            && let Some(badge) = self.store.get_badge(badge_id).await?
            && let Some(granted) = self.granter.award_badge(subject_id, &badge).await?
        {
            result.granted_badges.push(granted);
        }

        if let Some(achievement_id) = rule.achievement_id
            && let Some(achievement) = self.store.get_achievement(achievement_id).await?
        {
            let grant = UserAchievement {
                subject_id: subject_id.to_string(),
                achievement_id,
                granted_at: chrono::Utc::now(),
            };
            if self.store.insert_user_achievement(&grant).await?.is_inserted() {
                result.granted_achievements.push(GrantedAchievement {
                    achievement_id,
                    achievement_name: achievement.name.clone(),
                });
            }
        }

        info!(
            rule_id = rule.id,
            rule_name = %rule.name,
            subject_id = %subject_id,
            xp = reward.xp,
            coins = reward.coins,
            "规则命中并执行"
        );

        Ok(())
    }
}

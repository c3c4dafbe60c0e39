//! 任务进度状态机
//!
//! 任务是带顺序步骤的状态机：只有当前步骤可以被推进，前置步骤完成
//! 之前后续步骤的事件不产生任何效果。进度在发奖之前持久化，事件
//! 重放时状态机只会停在原地，不会重复推进或重复发奖。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use wayfarer_shared::error::Result;
use wayfarer_shared::events::{EngineResult, GameEvent};

use crate::condition::{Condition, ConditionEvaluator, EventContext};
use crate::counts::CountAggregator;
use crate::models::{Quest, QuestStatus, UserQuest};
use crate::rewards::RewardGranter;
use crate::store::GamificationStore;

/// 任务推进器
pub struct QuestProgressor<S> {
    store: Arc<S>,
    granter: RewardGranter<S>,
    aggregator: CountAggregator<S>,
}

impl<S: GamificationStore> QuestProgressor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            granter: RewardGranter::new(Arc::clone(&store)),
            aggregator: CountAggregator::new(Arc::clone(&store)),
            store,
        }
    }

    /// 用单个事件推进用户所有进行中的任务
    ///
    /// 单个任务的数据问题或执行失败只影响该任务自身。
    pub async fn advance(&self, event: &GameEvent) -> Result<EngineResult> {
        let mut result = EngineResult::default();
        let in_progress = self.store.in_progress_quests(&event.subject_id).await?;
        if in_progress.is_empty() {
            return Ok(result);
        }

        let ctx = EventContext::new(event.context.clone());

        for user_quest in in_progress {
            let quest_id = user_quest.quest_id;
            if let Err(e) = self
                .advance_quest(user_quest, event, &ctx, &mut result)
                .await
            {
                warn!(
                    quest_id,
                    subject_id = %event.subject_id,
                    error = %e,
                    "任务推进失败，继续处理其余任务"
                );
                result
                    .errors
                    .push(format!("quest {} failed: {}", quest_id, e));
            }
        }

        Ok(result)
    }

    /// 推进单个任务
    async fn advance_quest(
        &self,
        mut user_quest: UserQuest,
        event: &GameEvent,
        ctx: &EventContext,
        result: &mut EngineResult,
    ) -> Result<()> {
        let Some(quest) = self.store.get_quest(user_quest.quest_id).await? else {
            // 任务定义已被删除，进度记录成为孤儿，跳过
            warn!(quest_id = user_quest.quest_id, "任务定义不存在，跳过");
            return Ok(());
        };
        if !quest.is_active {
            return Ok(());
        }

        let Some(step) = quest.step(user_quest.current_step) else {
            // current_step 超出步骤定义范围，数据不一致，跳过
            warn!(
                quest_id = quest.id,
                current_step = user_quest.current_step,
                "当前步骤在任务定义中不存在，跳过"
            );
            return Ok(());
        };

        if step.trigger != event.trigger {
            return Ok(());
        }

        let condition = Condition::for_quest_step(&step.condition);
        let satisfied = match &condition {
            // 计数条件与规则条件共用同一套语法，同样路由到计数聚合器
            Condition::Count {
                field,
                operator,
                value,
            } => {
                self.aggregator
                    .satisfies(&event.subject_id, *field, *operator, *value)
                    .await?
            }
            other => ConditionEvaluator::evaluate(other, ctx),
        };
        if !satisfied {
            debug!(
                quest_id = quest.id,
                step = step.step_number,
                "步骤条件未满足"
            );
            return Ok(());
        }

        user_quest.progress.insert(step.step_number, true);
        let completed = user_quest.all_steps_complete(&quest);
        if completed {
            user_quest.status = QuestStatus::Completed;
            user_quest.completed_at = Some(Utc::now());
        } else {
            user_quest.current_step += 1;
        }

        // 先持久化再发奖：事件重放时状态机停在原地，奖励不重复
        self.store.save_user_quest(&user_quest).await?;

        if !step.reward.is_zero() {
            self.granter
                .grant_rewards(
                    &event.subject_id,
                    step.reward,
                    &format!("Quest Step: {}", step.title),
                )
                .await?;
        }

        info!(
            quest_id = quest.id,
            quest_name = %quest.name,
            step = step.step_number,
            subject_id = %event.subject_id,
            completed,
            "任务步骤完成"
        );

        if completed {
            self.complete_quest(&quest, &event.subject_id, result).await?;
        }

        Ok(())
    }

    /// 任务整体完成：发放完成奖励与完成徽章
    async fn complete_quest(
        &self,
        quest: &Quest,
        subject_id: &str,
        result: &mut EngineResult,
    ) -> Result<()> {
        if !quest.completion_reward.is_zero() {
            self.granter
                .grant_rewards(
                    subject_id,
                    quest.completion_reward,
                    &format!("Quest Completed: {}", quest.name),
                )
                .await?;
        }

        if let Some(badge_id) = quest.completion_badge_id
            && let Some(badge) = self.store.get_badge(badge_id).await?
            && let Some(granted) = self.granter.award_badge(subject_id, &badge).await?
        {
            result.granted_badges.push(granted);
        }

        info!(
            quest_id = quest.id,
            quest_name = %quest.name,
            subject_id = %subject_id,
            "任务全部完成"
        );

        Ok(())
    }
}

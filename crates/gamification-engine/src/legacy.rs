//! 旧版徽章回退评估
//!
//! 规则引擎上线前，徽章的发放条件直接写在徽章自身的 `criteria` 字段里。
//! 仅当某事件类型一条激活规则都没有时才走这条回退路径；只要存在激活
//! 规则（无论是否命中），回退路径都不执行。
//!
//! 回退路径只理解签到事件上的 location 判据，其余判据一律跳过。

use std::sync::Arc;

use tracing::{debug, info, warn};

use wayfarer_shared::error::Result;
use wayfarer_shared::events::{EngineResult, GameEvent, TriggerEvent};

use crate::condition::{Condition, ConditionEvaluator, EventContext};
use crate::rewards::RewardGranter;
use crate::store::GamificationStore;

/// 旧版徽章评估器
pub struct LegacyBadgeEvaluator<S> {
    store: Arc<S>,
    granter: RewardGranter<S>,
}

impl<S: GamificationStore> LegacyBadgeEvaluator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            granter: RewardGranter::new(Arc::clone(&store)),
            store,
        }
    }

    /// 对单个事件评估全部旧版徽章判据
    pub async fn evaluate(&self, event: &GameEvent) -> Result<EngineResult> {
        let mut result = EngineResult::default();

        // 旧版判据只定义在签到事件上
        if event.trigger != TriggerEvent::CheckIn {
            return Ok(result);
        }

        let ctx = EventContext::new(event.context.clone());
        let badges = self.store.list_badges().await?;

        for badge in &badges {
            let condition = Condition::parse(&badge.criteria);
            // 回退路径只支持 location 判据
            if !matches!(condition, Condition::Location { .. }) {
                continue;
            }
            if !ConditionEvaluator::evaluate(&condition, &ctx) {
                continue;
            }

            match self.granter.award_badge(&event.subject_id, badge).await {
                Ok(Some(granted)) => {
                    info!(
                        badge_id = badge.id,
                        badge_name = %badge.name,
                        subject_id = %event.subject_id,
                        "旧版判据命中，徽章发放"
                    );
                    result.granted_badges.push(granted);
                }
                Ok(None) => {
                    debug!(badge_id = badge.id, "徽章已持有，旧版判据跳过");
                }
                Err(e) => {
                    warn!(
                        badge_id = badge.id,
                        error = %e,
                        "旧版徽章发放失败，继续评估后续徽章"
                    );
                    result
                        .errors
                        .push(format!("legacy badge {} failed: {}", badge.id, e));
                }
            }
        }

        Ok(result)
    }
}

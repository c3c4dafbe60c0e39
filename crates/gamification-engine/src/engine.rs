//! 游戏化引擎门面
//!
//! 单事件处理入口：取用户锁之后依次执行规则匹配、旧版回退评估、
//! 任务推进，合并各阶段结果。同一用户的事件在此串行，部分失败
//! 收敛为结果内的错误列表而不是整体报错。

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use wayfarer_shared::config::EngineConfig;
use wayfarer_shared::error::{Result, WayfarerError};
use wayfarer_shared::events::{EngineResult, GameEvent};

use crate::legacy::LegacyBadgeEvaluator;
use crate::lock::SubjectLockManager;
use crate::matcher::{MatchOutcome, RuleMatcher};
use crate::quest::QuestProgressor;
use crate::store::GamificationStore;

/// 游戏化引擎
pub struct GamificationEngine<S> {
    store: Arc<S>,
    matcher: RuleMatcher<S>,
    legacy: LegacyBadgeEvaluator<S>,
    quests: QuestProgressor<S>,
    locks: SubjectLockManager,
    config: EngineConfig,
}

impl<S: GamificationStore> GamificationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            matcher: RuleMatcher::new(Arc::clone(&store)),
            legacy: LegacyBadgeEvaluator::new(Arc::clone(&store)),
            quests: QuestProgressor::new(Arc::clone(&store)),
            locks: SubjectLockManager::new(),
            config,
            store,
        }
    }

    /// 底层存储句柄
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 处理单个事件
    ///
    /// 仅当事件类型连一条激活规则都没有时才走旧版徽章回退；
    /// 有规则但全部未命中不触发回退。任务推进始终执行。
    #[instrument(skip(self, event), fields(event_id = %event.event_id, trigger = %event.trigger, subject_id = %event.subject_id))]
    pub async fn process(&self, event: &GameEvent) -> Result<EngineResult> {
        if event.subject_id.trim().is_empty() {
            return Err(WayfarerError::Validation(
                "subject_id must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let _guard = self.locks.acquire(&event.subject_id).await;

        let mut result = match self.matcher.evaluate(event).await? {
            MatchOutcome::Evaluated(result) => result,
            MatchOutcome::NoActiveRules if self.config.legacy_fallback_enabled => {
                self.legacy.evaluate(event).await?
            }
            MatchOutcome::NoActiveRules => EngineResult::default(),
        };

        result.merge(self.quests.advance(event).await?);
        result.processing_time_ms = started.elapsed().as_millis() as i64;

        info!(
            badges = result.granted_badges.len(),
            achievements = result.granted_achievements.len(),
            errors = result.errors.len(),
            elapsed_ms = result.processing_time_ms,
            "事件处理完成"
        );

        Ok(result)
    }
}

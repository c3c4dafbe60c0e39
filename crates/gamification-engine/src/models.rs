//! 游戏化引擎领域模型
//!
//! 规则、徽章、成就、任务及其用户侧发放/进度记录。
//! 规则与任务步骤的条件以原始 JSON 承载，评估时才做失败关闭式解析，
//! 单条规则的条件畸形只会让该规则不触发，不影响整体反序列化。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfarer_shared::events::TriggerEvent;

/// 奖励数额（XP + 金币）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAmount {
    pub xp: i64,
    pub coins: i64,
}

impl RewardAmount {
    pub fn new(xp: i64, coins: i64) -> Self {
        Self { xp, coins }
    }

    pub fn is_zero(&self) -> bool {
        self.xp == 0 && self.coins == 0
    }
}

/// 规则定义
///
/// 由管理员创建/编辑，对引擎只读；通过 `is_active` 软禁用，
/// 历史记录仍引用规则时不允许硬删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: i64,
    pub name: String,
    /// 触发事件，规则按事件索引
    pub trigger: TriggerEvent,
    /// 结构化条件谓词（原始 JSON，评估时失败关闭式解析）
    pub condition: Value,
    /// 优先级，数值越大越先评估（只影响评估顺序，不影响是否触发）
    pub priority: i32,
    pub is_active: bool,
    pub badge_id: Option<i64>,
    pub achievement_id: Option<i64>,
    pub xp_reward: i64,
    pub coins_reward: i64,
    /// 自由格式元数据
    #[serde(default)]
    pub metadata: Value,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// 规则直接携带的奖励数额
    pub fn reward(&self) -> RewardAmount {
        RewardAmount::new(self.xp_reward, self.coins_reward)
    }
}

/// 徽章定义
///
/// `criteria` 是旧版规则体系遗留的静态谓词（条件语言的单谓词子集），
/// 仅由旧版回退评估器使用。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: i64,
    pub name: String,
    /// 获得徽章时发放的 XP
    pub xp_value: i64,
    /// 旧版静态评估条件
    #[serde(default)]
    pub criteria: Value,
}

/// 成就定义
///
/// 成就本身不带奖励数额，奖励来自引用它的规则。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i64,
    pub name: String,
}

/// 任务步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestStep {
    /// 步骤号，1 起始且连续
    pub step_number: i32,
    pub title: String,
    /// 步骤只响应其指定的触发事件
    pub trigger: TriggerEvent,
    /// 步骤条件（空对象 `{}` 表示事件匹配即满足）
    #[serde(default = "empty_condition")]
    pub condition: Value,
    /// 步骤奖励
    #[serde(default)]
    pub reward: RewardAmount,
}

/// 未显式配置条件的任务步骤默认为空对象，即"事件匹配即满足"
fn empty_condition() -> Value {
    Value::Object(serde_json::Map::new())
}

/// 任务定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: i64,
    pub name: String,
    /// 按 step_number 升序排列的步骤列表
    pub steps: Vec<QuestStep>,
    /// 任务完成奖励
    #[serde(default)]
    pub completion_reward: RewardAmount,
    pub completion_badge_id: Option<i64>,
    pub is_active: bool,
}

impl Quest {
    /// 按步骤号查找步骤
    pub fn step(&self, step_number: i32) -> Option<&QuestStep> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    /// 步骤总数
    pub fn step_count(&self) -> i32 {
        self.steps.len() as i32
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    InProgress,
    Completed,
}

/// 用户任务进度
///
/// 每个 (用户, 任务) 至多一行。不变式：
/// - `current_step` 只增不减
/// - `progress` 中一旦置 true 的步骤不会被清除
/// - `Completed` 是终态，不再有任何迁移（任务一次性，不可重入）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuest {
    pub subject_id: String,
    pub quest_id: i64,
    pub status: QuestStatus,
    pub current_step: i32,
    /// 步骤号 -> 是否完成
    #[serde(default)]
    pub progress: BTreeMap<i32, bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserQuest {
    /// 创建初始进度（第 1 步，空进度表）
    pub fn start(subject_id: impl Into<String>, quest_id: i64) -> Self {
        Self {
            subject_id: subject_id.into(),
            quest_id,
            status: QuestStatus::InProgress,
            current_step: 1,
            progress: BTreeMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 任务的全部步骤（1..=N）是否都已完成
    pub fn all_steps_complete(&self, quest: &Quest) -> bool {
        (1..=quest.step_count()).all(|n| self.progress.get(&n).copied().unwrap_or(false))
    }
}

/// 用户徽章发放记录
///
/// (subject_id, badge_id) 上的唯一性约束是幂等发放的锚点。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub subject_id: String,
    pub badge_id: i64,
    pub granted_at: DateTime<Utc>,
}

/// 用户成就解锁记录
///
/// 与徽章相同，(subject_id, achievement_id) 唯一。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub subject_id: String,
    pub achievement_id: i64,
    pub granted_at: DateTime<Utc>,
}

/// 奖励账本条目
///
/// 每一次奖励应用（规则、徽章、任务步骤、任务完成）恰好产生一条。
/// 用户的聚合 XP/金币/等级与账本同步增量更新，账本是幂等审计的依据。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub subject_id: String,
    pub amount: RewardAmount,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// 用户奖励聚合
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRewards {
    pub xp: i64,
    pub coins: i64,
    pub level: i32,
}

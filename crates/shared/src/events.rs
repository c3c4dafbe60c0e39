//! 事件模型
//!
//! 定义游戏化系统的统一事件信封、触发事件词汇表以及引擎处理结果。
//! 所有用户动作（建行程、签到、下单……）都以 `GameEvent` 的形式进入
//! 引擎门面，引擎返回 `EngineResult` 供上层做即时 UI 反馈。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TriggerEvent — 触发事件词汇表
// ---------------------------------------------------------------------------

/// 触发事件枚举
///
/// 按业务域划分为三大类：行程规划、交易、互动发现。
/// 规则与任务步骤都以触发事件为索引，扩展词汇表属于代码变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    // 行程规划类事件 — 围绕行程生命周期
    TripCreated,
    TripCompleted,

    // 交易类事件 — 涉及真实订单，需与预订系统核对
    BookingMade,

    // 互动发现类事件 — 用户在地图/滑动探索中的主动行为
    CheckIn,
    ReviewPosted,
    BusinessSaved,
    SwipeLike,
    SwipeDislike,
}

impl TriggerEvent {
    /// 行程规划类事件对应行程生命周期节点
    pub fn is_planning(&self) -> bool {
        matches!(self, Self::TripCreated | Self::TripCompleted)
    }

    /// 交易类事件涉及资金流转
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::BookingMade)
    }

    /// 互动发现类事件反映用户活跃度，是奖励触发最常见的来源
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::CheckIn
                | Self::ReviewPosted
                | Self::BusinessSaved
                | Self::SwipeLike
                | Self::SwipeDislike
        )
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 与 serde 的 snake_case 序列化保持一致，
        // 便于在日志和规则配置中统一引用
        let s = match self {
            Self::TripCreated => "trip_created",
            Self::TripCompleted => "trip_completed",
            Self::BookingMade => "booking_made",
            Self::CheckIn => "check_in",
            Self::ReviewPosted => "review_posted",
            Self::BusinessSaved => "business_saved",
            Self::SwipeLike => "swipe_like",
            Self::SwipeDislike => "swipe_dislike",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// GameEvent — 通用事件信封
// ---------------------------------------------------------------------------

/// 通用事件信封
///
/// 所有进入游戏化引擎的用户动作都包装在此信封中：
/// - `event_id`（UUID v7）时间有序，便于索引与追踪
/// - `context` 以 JSON 承载不同事件类型的上下文元数据（城市、商家类型等），
///   避免为每种事件定义独立结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    /// 事件唯一标识（UUID v7）
    pub event_id: String,
    /// 触发事件类型
    pub trigger: TriggerEvent,
    /// 触发事件的用户 ID
    pub subject_id: String,
    /// 事件发生时间
    pub occurred_at: DateTime<Utc>,
    /// 事件上下文元数据（JSON 对象）
    pub context: Value,
    /// 事件来源系统
    pub source: String,
    /// 追踪 ID（用于串联分布式追踪）
    pub trace_id: Option<String>,
}

impl GameEvent {
    /// 构建新事件，自动生成 UUID v7 作为 event_id 并记录当前时间
    pub fn new(
        trigger: TriggerEvent,
        subject_id: impl Into<String>,
        context: Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            trigger,
            subject_id: subject_id.into(),
            occurred_at: Utc::now(),
            context,
            source: source.into(),
            trace_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineResult — 引擎处理结果
// ---------------------------------------------------------------------------

/// 引擎处理结果
///
/// 记录单个事件经过规则匹配与任务推进后的完整结果。
/// `errors` 收集处理过程中被降级跳过的规则/任务错误，
/// 部分失败不会中断整体流程，也不会向最终用户暴露。
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineResult {
    /// 本次事件新发放的徽章（用于即时 UI 反馈）
    pub granted_badges: Vec<GrantedBadge>,
    /// 本次事件新解锁的成就
    pub granted_achievements: Vec<GrantedAchievement>,
    /// 处理耗时（毫秒）
    pub processing_time_ms: i64,
    /// 部分规则/任务执行失败时收集错误信息，不中断整体流程
    pub errors: Vec<String>,
}

impl EngineResult {
    /// 合并另一个阶段的处理结果（规则匹配 + 任务推进两个阶段）
    pub fn merge(&mut self, other: EngineResult) {
        self.granted_badges.extend(other.granted_badges);
        self.granted_achievements.extend(other.granted_achievements);
        self.errors.extend(other.errors);
    }
}

/// 已成功发放的徽章记录
#[derive(Debug, Clone, Serialize)]
pub struct GrantedBadge {
    pub badge_id: i64,
    pub badge_name: String,
    /// 徽章自带的 XP 值（发放时已计入账本）
    pub xp_value: i64,
}

/// 已成功解锁的成就记录
#[derive(Debug, Clone, Serialize)]
pub struct GrantedAchievement {
    pub achievement_id: i64,
    pub achievement_name: String,
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

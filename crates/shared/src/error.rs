//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum WayfarerError {
    // ==================== 存储错误 ====================
    /// 存储层操作失败。存储后端是外部协作方，引擎只看到抽象的
    /// 数据访问接口，因此这里统一以字符串承载底层错误信息。
    #[error("存储错误: {0}")]
    Store(String),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 规则引擎错误 ====================
    #[error("条件解析失败: {0}")]
    ConditionParseFailed(String),

    #[error("规则执行失败: rule_id={rule_id} - {message}")]
    RuleExecutionFailed { rule_id: i64, message: String },

    // ==================== 任务进度错误 ====================
    #[error("任务数据异常: quest_id={quest_id} - {message}")]
    QuestDataInvalid { quest_id: i64, message: String },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, WayfarerError>;

impl WayfarerError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "STORE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ConditionParseFailed(_) => "CONDITION_PARSE_FAILED",
            Self::RuleExecutionFailed { .. } => "RULE_EXECUTION_FAILED",
            Self::QuestDataInvalid { .. } => "QUEST_DATA_INVALID",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 存储层的瞬时故障可以安全重试：奖励发放依赖唯一性约束做幂等，
    /// 重试整个事件处理调用不会重复发放已成功的部分。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

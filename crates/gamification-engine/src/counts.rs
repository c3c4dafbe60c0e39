//! 累计计数条件求值
//!
//! count 类条件依赖历史聚合数据，只能在此异步路径上求值；
//! 纯求值器对 count 条件一律返回 false。未知字段或未知比较符
//! 同样按不满足处理，绝不触发存储查询。

use std::sync::Arc;

use tracing::debug;

use wayfarer_shared::error::Result;

use crate::condition::{CountField, Operator};
use crate::store::GamificationStore;

/// 计数聚合器
pub struct CountAggregator<S> {
    store: Arc<S>,
}

impl<S> Clone for CountAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GamificationStore> CountAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 判定用户的累计计数是否满足阈值
    ///
    /// 当前事件在判定前已计入聚合，因此"第 5 次打卡"在第 5 个
    /// 事件处理时即可满足 `count >= 5`。
    pub async fn satisfies(
        &self,
        subject_id: &str,
        field: CountField,
        operator: Operator,
        threshold: i64,
    ) -> Result<bool> {
        if matches!(field, CountField::Unknown) || matches!(operator, Operator::Unknown) {
            debug!(
                subject_id = %subject_id,
                "计数条件包含未知字段或比较符，按不满足处理"
            );
            return Ok(false);
        }

        let count = self.store.count_for_subject(field, subject_id).await?;
        let satisfied = operator.compare(count, threshold);

        debug!(
            subject_id = %subject_id,
            field = %field,
            count,
            threshold,
            satisfied,
            "计数条件求值完成"
        );

        Ok(satisfied)
    }
}

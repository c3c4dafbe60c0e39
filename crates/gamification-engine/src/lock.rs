//! 按用户串行化
//!
//! 同一用户的事件必须串行处理，不同用户之间完全并行。
//! 锁粒度是 subject_id，持锁范围覆盖单个事件的完整处理
//! （规则匹配、回退评估、任务推进），跨事件不保序。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 用户级锁管理器
///
/// 惰性创建每个用户的异步互斥锁。锁对象一经创建即长期保留，
/// 活跃用户集合有限，不做过期回收。
#[derive(Default)]
pub struct SubjectLockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SubjectLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定用户的处理锁，guard 存活期间该用户的其他事件等待
    pub async fn acquire(&self, subject_id: &str) -> OwnedMutexGuard<()> {
        // 先克隆 Arc 再 await，不能跨 await 持有分片引用
        let lock: Arc<Mutex<()>> = self
            .locks
            .entry(subject_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

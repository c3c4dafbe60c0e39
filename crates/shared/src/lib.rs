//! 共享库
//!
//! 包含游戏化子系统各组件共用的配置、错误处理、事件模型与日志初始化代码。

pub mod config;
pub mod error;
pub mod events;
pub mod observability;

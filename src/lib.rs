//! Gas Town - Agent 会话生命周期守护进程与 town 状态汇总
//!
//! 模块划分：
//! - **agents**: 角色、会话名 / agent bead id / 地址推导，hook 解析
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、关闭管理
//! - **lifecycle**: 生命周期请求解析、身份解析、守护进程
//! - **observability**: tracing 初始化
//! - **session**: 会话控制（tmux 实现与测试用记录实现）
//! - **status**: 状态快照、汇总与输出
//! - **store**: 消息与 bead 存储（SQLite / 内存）
//! - **town**: 工作区根目录、town / rig 配置与 rig 发现

pub mod agents;
pub mod config;
pub mod core;
pub mod lifecycle;
pub mod observability;
pub mod session;
pub mod status;
pub mod store;
pub mod town;

pub use lifecycle::{LifecycleAction, LifecycleDaemon};
pub use status::{StatusAggregator, TownStatus};

//! Hive - Rust 任务编排引擎
//!
//! 内嵌于聊天应用的自主任务编排核心：把自然语言请求分解为带依赖边的工具任务图，
//! 在并发上限内按依赖执行，失败任务反思与重试；单次模型调用吞不下的输入走
//! 递归分治引擎（分块 + 深度 / 时限约束）。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 计划类型、构建器、错误分类、不可信输出校验
//! - **executor**: 计划执行器（顺序 / 并行 / 混合调度，重试与观察回调）
//! - **llm**: 模型调用抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 路由器）
//! - **observability**: tracing 初始化
//! - **planner**: 请求规划（任务图生成、拓扑排序、失败重规划）
//! - **reflect**: 任务结果反思（评估、修复建议、模式分析）
//! - **rlm**: 递归处理引擎（分块器、轨迹、四种分治策略）
//! - **tools**: 工具边界（Tool trait、注册表、带超时的执行器）

pub mod config;
pub mod core;
pub mod executor;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod reflect;
pub mod rlm;
pub mod tools;

pub use crate::core::{ExecutionStrategy, OrchestratorError, PlanBuilder, Task, TaskPlan, TaskStatus};
pub use executor::{ExecutionReport, ExecutorConfig, ExecutorHooks, PlanExecutor};
pub use planner::{PlanContext, Planner};
pub use reflect::Reflector;
pub use rlm::{ChunkStrategy, RlmConfig, RlmExecutor, RlmOutcome, RlmStrategy};

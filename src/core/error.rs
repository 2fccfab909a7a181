//! 编排引擎错误类型
//!
//! 按错误类别（解析 / 依赖 / 工具 / 资源上限 / 后端）划分变体：
//! 解析类错误由各组件降级为兜底路径，依赖环与资源上限为致命错误需上报调用方。

use thiserror::Error;

/// 编排过程中可能出现的错误（规划、执行、反思、递归处理共用）
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Plan validation failed: {0}")]
    ValidationError(String),

    /// 任务依赖成环（含传递环），规划阶段的致命错误
    #[error("Cyclic dependency detected involving task '{0}'")]
    CyclicDependency(String),

    #[error("Unknown task reference: {0}")]
    UnknownTaskReference(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 递归深度达到上限（与超时区分，调用方可分别处理）
    #[error("Recursion depth limit reached: {0}")]
    DepthExceeded(usize),

    /// 递归处理超过墙钟时限
    #[error("Execution deadline exceeded after {0} ms")]
    DeadlineExceeded(u64),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}

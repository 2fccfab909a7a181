//! 任务计划核心类型
//!
//! 定义 Task / TaskPlan / 执行策略 / 反思结果等共享数据结构。
//! 计划由 Planner 创建、Executor 原地更新任务状态；所有结构仅存在于内存中，不落盘。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待执行
    Pending,
    /// 正在执行
    InProgress,
    /// 已完成
    Completed,
    /// 失败（重试耗尽）
    Failed,
    /// 跳过（依赖未满足或已取消）
    Skipped,
}

impl TaskStatus {
    /// 是否为终态（不会再被调度）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// 计划状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// 规划中
    Planning,
    /// 执行中
    Executing,
    /// 全部任务成功
    Completed,
    /// 存在失败任务
    Failed,
}

/// 执行策略：Executor 依此选择调度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// 严格按计划顺序执行，首个失败即停止
    Sequential,
    /// 按并发上限分批，整批等待
    Parallel,
    /// 依赖驱动的就绪集循环
    Mixed,
}

/// 计划中的一个工具任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 计划内唯一标识
    pub id: String,
    /// 任务描述（无工具绑定时直接作为模型提示）
    pub description: String,
    pub status: TaskStatus,
    /// 绑定的工具名；None 表示由模型直接回答
    pub tool: Option<String>,
    /// 工具参数包，值中可含 `${taskId.path}` 占位符
    #[serde(default)]
    pub args: HashMap<String, Value>,
    /// 依赖的任务 ID（只允许引用同计划内的任务）
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// 完成时写入的结果值
    pub result: Option<Value>,
    /// 失败时记录的最后错误
    pub error: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub retry_count: u32,
    /// 可选的嵌套子任务
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            tool: None,
            args: HashMap::new(),
            dependencies: Vec::new(),
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            subtasks: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_args(mut self, args: HashMap<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// 任务计划：一组带依赖边的任务加选定的执行策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: String,
    /// 原始用户请求文本
    pub request: String,
    /// 有序任务列表（Sequential 模式按此顺序执行）
    pub tasks: Vec<Task>,
    pub strategy: ExecutionStrategy,
    pub status: PlanStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub created_at: i64,
}

impl TaskPlan {
    pub fn new(request: impl Into<String>, tasks: Vec<Task>, strategy: ExecutionStrategy) -> Self {
        let total_tasks = tasks.len();
        Self {
            id: format!("plan_{}", uuid::Uuid::new_v4()),
            request: request.into(),
            tasks,
            strategy,
            status: PlanStatus::Planning,
            total_tasks,
            completed_tasks: 0,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// 失败任务列表（终态快照，供调用方逐任务展示）
    pub fn failed_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect()
    }
}

/// 反思结果：对一次任务执行的结构化事后评估
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub success: bool,
    /// 置信度，[0.0, 1.0]
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// 是否建议重试
    pub should_retry: bool,
    /// 建议的替代任务
    pub alternative: Option<Task>,
}

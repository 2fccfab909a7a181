//! 计划构建器
//!
//! 提供流畅的 API 供内嵌调用方与测试手工构建计划

use std::collections::HashMap;

use serde_json::Value;

use crate::core::error::OrchestratorError;
use crate::core::types::{ExecutionStrategy, Task, TaskPlan};

/// 计划构建器
pub struct PlanBuilder {
    request: String,
    tasks: Vec<Task>,
    strategy: Option<ExecutionStrategy>,
}

impl PlanBuilder {
    /// 以原始请求文本创建构建器
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            tasks: Vec::new(),
            strategy: None,
        }
    }

    /// 追加任务
    pub fn task(mut self, id: impl Into<String>, description: impl Into<String>) -> Self {
        self.tasks.push(Task::new(id, description));
        self
    }

    /// 为最后追加的任务绑定工具
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        if let Some(task) = self.tasks.last_mut() {
            task.tool = Some(tool.into());
        }
        self
    }

    /// 为最后追加的任务设置参数包
    pub fn args(mut self, args: HashMap<String, Value>) -> Self {
        if let Some(task) = self.tasks.last_mut() {
            task.args = args;
        }
        self
    }

    /// 为最后追加的任务设置单个参数
    pub fn arg(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Some(task) = self.tasks.last_mut() {
            task.args.insert(key.into(), value);
        }
        self
    }

    /// 为指定任务设置依赖
    pub fn depends_on(mut self, task_id: &str, deps: &[&str]) -> Self {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.dependencies = deps.iter().map(|d| d.to_string()).collect();
        }
        self
    }

    /// 显式指定执行策略（缺省时按依赖结构自动分类）
    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 构建计划；校验任务 ID 唯一且依赖只引用计划内任务
    pub fn build(self) -> Result<TaskPlan, OrchestratorError> {
        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(OrchestratorError::ValidationError(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }
        for task in &self.tasks {
            for dep in &task.dependencies {
                if dep == &task.id {
                    return Err(OrchestratorError::CyclicDependency(task.id.clone()));
                }
                if !seen.contains(dep.as_str()) {
                    return Err(OrchestratorError::UnknownTaskReference(format!(
                        "task '{}' depends on unknown '{}'",
                        task.id, dep
                    )));
                }
            }
        }

        let strategy = self
            .strategy
            .unwrap_or_else(|| crate::planner::classify_strategy(&self.tasks));
        Ok(TaskPlan::new(self.request, self.tasks, strategy))
    }
}

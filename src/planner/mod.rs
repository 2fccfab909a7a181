//! Planner：把自然语言请求规划为任务图
//!
//! 调用 LLM 得到 {tasks, reasoning} JSON；响应不可信，必须通过强类型校验后才接受。
//! 任何校验失败（无 JSON、字段类型错、依赖引用不存在）都降级为单任务兜底计划，
//! 让调用方仍可尝试直接回答。未知工具名只告警不拒绝，真实失败留给执行期上浮。

use std::collections::HashMap;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::core::validate::{parse_llm_array, parse_llm_object, Validated};
use crate::core::{ExecutionStrategy, OrchestratorError, Task, TaskPlan};
use crate::llm::ModelCaller;

/// 规划上下文：对话历史、可用工具（name, description）、额外约束
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    pub history: Vec<String>,
    pub available_tools: Vec<(String, String)>,
    pub constraints: Vec<String>,
}

/// LLM 应返回的计划格式（强类型校验 + Schema 生成共用）
#[derive(Debug, Deserialize, JsonSchema)]
struct RawPlan {
    tasks: Vec<RawTask>,
    /// 规划思路说明，仅用于日志
    #[allow(dead_code)]
    reasoning: Option<String>,
}

/// 计划中单个任务的原始格式
#[derive(Debug, Deserialize, JsonSchema)]
struct RawTask {
    /// 模型可自带 id；缺省时按位置分配 task_N
    id: Option<String>,
    description: String,
    tool: Option<String>,
    args: Option<HashMap<String, Value>>,
    dependencies: Option<Vec<String>>,
}

/// 返回计划 JSON 的 Schema 字符串，拼入规划 prompt 约束模型输出格式
pub fn plan_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(RawPlan)).unwrap_or_else(|_| "{}".to_string())
}

/// 按依赖结构为任务列表分类执行策略
pub fn classify_strategy(tasks: &[Task]) -> ExecutionStrategy {
    let has_deps = tasks.iter().any(|t| !t.dependencies.is_empty());
    if !has_deps && tasks.len() > 1 {
        ExecutionStrategy::Parallel
    } else if has_deps && tasks.len() > 3 {
        ExecutionStrategy::Mixed
    } else {
        ExecutionStrategy::Sequential
    }
}

/// Planner：持有模型调用器，负责 plan / optimize_plan / replan
pub struct Planner {
    model: Arc<dyn ModelCaller>,
    model_hint: Option<String>,
}

impl Planner {
    pub fn new(model: Arc<dyn ModelCaller>) -> Self {
        Self {
            model,
            model_hint: None,
        }
    }

    /// 指定规划调用使用的模型
    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// 将请求规划为任务图；失败时返回单任务兜底计划，从不返回 Err
    pub async fn plan(&self, request: &str, context: &PlanContext) -> TaskPlan {
        let prompt = self.build_plan_prompt(request, context);

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "planner backend call failed, using fallback plan");
                return fallback_plan(request);
            }
        };

        match self.parse_plan(request, &response, context) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::warn!(reason = %reason, "plan response rejected, using fallback plan");
                fallback_plan(request)
            }
        }
    }

    /// 校验响应并转换为 TaskPlan；Err 携带拒绝原因
    fn parse_plan(
        &self,
        request: &str,
        response: &str,
        context: &PlanContext,
    ) -> Result<TaskPlan, String> {
        let raw: RawPlan = match parse_llm_object(response) {
            Validated::Valid(v) => v,
            Validated::Invalid(reason) => return Err(reason),
        };
        if raw.tasks.is_empty() {
            return Err("plan contains no tasks".to_string());
        }

        let mut tasks = Vec::with_capacity(raw.tasks.len());
        for (i, raw_task) in raw.tasks.into_iter().enumerate() {
            if raw_task.description.is_empty() {
                return Err(format!("task {} has empty description", i + 1));
            }
            let id = raw_task
                .id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("task_{}", i + 1));

            if let Some(tool) = raw_task.tool.as_deref() {
                let known = context.available_tools.iter().any(|(name, _)| name == tool);
                if !known {
                    tracing::warn!(tool = %tool, task = %id, "plan references unknown tool");
                }
            }

            let mut task = Task::new(id, raw_task.description);
            task.tool = raw_task.tool;
            task.args = raw_task.args.unwrap_or_default();
            task.dependencies = raw_task.dependencies.unwrap_or_default();
            tasks.push(task);
        }

        // 依赖只允许引用本计划内的任务
        let ids: std::collections::HashSet<&str> =
            tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &tasks {
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep
                    ));
                }
            }
        }

        let strategy = classify_strategy(&tasks);
        Ok(TaskPlan::new(request, tasks, strategy))
    }

    /// 拓扑排序计划内任务并重新分类策略；依赖成环返回致命错误，绝不静默丢任务
    pub fn optimize_plan(&self, plan: &mut TaskPlan) -> Result<(), OrchestratorError> {
        let order = topological_order(&plan.tasks)?;
        let mut by_id: HashMap<String, Task> = plan
            .tasks
            .drain(..)
            .map(|t| (t.id.clone(), t))
            .collect();
        plan.tasks = order
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        plan.strategy = classify_strategy(&plan.tasks);
        Ok(())
    }

    /// 针对失败任务请求替换任务集；解析失败返回空列表表示「无替代方案」
    pub async fn replan(&self, plan: &TaskPlan, failed_task: &Task, error: &str) -> Vec<Task> {
        let prompt = format!(
            r#"A task in an execution plan has failed and needs replacement.

Original request: {}
Failed task: {}
Tool: {}
Error: {}

Propose replacement tasks as a JSON array:
[{{"description": "...", "tool": "optional tool name", "args": {{}}, "dependencies": []}}]

Return an empty array [] if the failure cannot be worked around."#,
            plan.request,
            failed_task.description,
            failed_task.tool.as_deref().unwrap_or("(none)"),
            error
        );

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "replan backend call failed");
                return Vec::new();
            }
        };

        let raw_tasks: Vec<RawTask> = match parse_llm_array(&response) {
            Validated::Valid(v) => v,
            Validated::Invalid(reason) => {
                tracing::warn!(reason = %reason, "replan response rejected");
                return Vec::new();
            }
        };

        raw_tasks
            .into_iter()
            .enumerate()
            .filter(|(_, raw)| !raw.description.is_empty())
            .map(|(i, raw)| {
                let id = raw
                    .id
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("replan_{}", i + 1));
                let mut task = Task::new(id, raw.description);
                task.tool = raw.tool;
                task.args = raw.args.unwrap_or_default();
                task.dependencies = raw.dependencies.unwrap_or_default();
                task
            })
            .collect()
    }

    fn build_plan_prompt(&self, request: &str, context: &PlanContext) -> String {
        let mut sections = Vec::new();
        sections.push(format!(
            "Decompose the following request into concrete tool-using tasks.\n\nRequest: {}",
            request
        ));

        if !context.history.is_empty() {
            sections.push(format!(
                "Conversation context:\n{}",
                context.history.join("\n")
            ));
        }

        if !context.available_tools.is_empty() {
            let tool_lines: Vec<String> = context
                .available_tools
                .iter()
                .map(|(name, desc)| format!("- {}: {}", name, desc))
                .collect();
            sections.push(format!("Available tools:\n{}", tool_lines.join("\n")));
        }

        if !context.constraints.is_empty() {
            sections.push(format!("Constraints:\n{}", context.constraints.join("\n")));
        }

        sections.push(format!(
            "Respond with a single JSON object matching this schema:\n{}\n\
             Each task needs a description; bind a tool only when one fits. \
             Use the dependencies array to reference ids of tasks that must finish first.",
            plan_schema_json()
        ));

        sections.join("\n\n")
    }
}

/// 单任务兜底计划：任务描述即原始请求，不绑定工具
fn fallback_plan(request: &str) -> TaskPlan {
    let task = Task::new("task_1", request);
    TaskPlan::new(request, vec![task], ExecutionStrategy::Sequential)
}

/// 深度优先拓扑排序，visiting 标记检测依赖环
fn topological_order(tasks: &[Task]) -> Result<Vec<String>, OrchestratorError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let index: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut marks: HashMap<&str, Mark> =
        tasks.iter().map(|t| (t.id.as_str(), Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(tasks.len());

    fn visit<'a>(
        id: &'a str,
        index: &HashMap<&'a str, &'a Task>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<(), OrchestratorError> {
        match marks.get(id).copied() {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(OrchestratorError::CyclicDependency(id.to_string()))
            }
            Some(Mark::Unvisited) => {}
            None => return Err(OrchestratorError::UnknownTaskReference(id.to_string())),
        }
        marks.insert(id, Mark::Visiting);
        if let Some(task) = index.get(id) {
            for dep in &task.dependencies {
                visit(dep.as_str(), index, marks, order)?;
            }
        }
        marks.insert(id, Mark::Done);
        order.push(id.to_string());
        Ok(())
    }

    for task in tasks {
        visit(task.id.as_str(), &index, &mut marks, &mut order)?;
    }
    Ok(order)
}

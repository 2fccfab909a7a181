//! Reflector：任务结果的结构化事后评估
//!
//! 每个方法都是「建 prompt → 调模型 → 从散文中抽取 JSON → 强类型校验」，
//! 解析失败一律走确定性兜底（由任务自身状态推导），反思绝不让调用方崩溃。
//! propose_correction 在「模型判定不可修复」与「响应解析失败」两种情况下都返回
//! None，两者语义不同但返回值上不区分（与原实现兼容），仅以 debug 日志区分。

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::core::validate::{parse_llm_object, Validated};
use crate::core::{ReflectionResult, Task, TaskStatus};
use crate::llm::ModelCaller;

/// 跨任务模式分析结果
#[derive(Debug, Clone, Deserialize)]
pub struct PatternAnalysis {
    #[serde(default)]
    pub common_issues: Vec<String>,
    #[serde(default)]
    pub success_patterns: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// 计划质量评估结果
#[derive(Debug, Clone, Deserialize)]
pub struct PlanEvaluation {
    pub score: f64,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// 模型应返回的反思格式
#[derive(Debug, Deserialize)]
struct RawReflection {
    success: bool,
    confidence: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    should_retry: bool,
    alternative: Option<RawAlternative>,
}

/// 替代任务的原始格式
#[derive(Debug, Deserialize)]
struct RawAlternative {
    description: String,
    tool: Option<String>,
    #[serde(default)]
    args: std::collections::HashMap<String, Value>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// 修复建议格式：fixable=false 表示模型确认无法修复
#[derive(Debug, Deserialize)]
struct RawCorrection {
    fixable: bool,
    task: Option<RawAlternative>,
}

impl RawAlternative {
    fn into_task(self, id: String) -> Task {
        let mut task = Task::new(id, self.description);
        task.tool = self.tool;
        task.args = self.args;
        task.dependencies = self.dependencies;
        task
    }
}

/// Reflector：持有模型调用器，负责 analyze_result / propose_correction /
/// analyze_patterns / evaluate_plan
pub struct Reflector {
    model: Arc<dyn ModelCaller>,
    model_hint: Option<String>,
}

impl Reflector {
    pub fn new(model: Arc<dyn ModelCaller>) -> Self {
        Self {
            model,
            model_hint: None,
        }
    }

    /// 指定反思调用使用的模型（可与规划模型分离，避免自我认同）
    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// 评估单个任务结果；后端不可达或响应不可解析时由任务状态推导兜底反思
    pub async fn analyze_result(
        &self,
        task: &Task,
        expected_outcome: Option<&str>,
    ) -> ReflectionResult {
        let prompt = format!(
            r#"Evaluate the outcome of an executed task.

Task: {}
Status: {:?}
Tool: {}
Result: {}
Error: {}
Expected outcome: {}

Respond with a JSON object:
{{"success": bool, "confidence": 0.0-1.0, "issues": [], "suggestions": [],
  "should_retry": bool, "alternative": {{"description": "...", "tool": null}} or null}}"#,
            task.description,
            task.status,
            task.tool.as_deref().unwrap_or("(none)"),
            task.result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            task.error.as_deref().unwrap_or("(none)"),
            expected_outcome.unwrap_or("(unspecified)"),
        );

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "reflection backend call failed, deriving from status");
                return fallback_reflection(task);
            }
        };

        match parse_llm_object::<RawReflection>(&response) {
            Validated::Valid(raw) => ReflectionResult {
                success: raw.success,
                confidence: raw.confidence.clamp(0.0, 1.0),
                issues: raw.issues,
                suggestions: raw.suggestions,
                should_retry: raw.should_retry,
                alternative: raw
                    .alternative
                    .map(|alt| alt.into_task(format!("{}_alt", task.id))),
            },
            Validated::Invalid(reason) => {
                tracing::debug!(reason = %reason, "reflection response rejected, deriving from status");
                fallback_reflection(task)
            }
        }
    }

    /// 为失败任务提出替代任务；模型判定不可修复或解析失败都返回 None
    pub async fn propose_correction(&self, failed_task: &Task, error: &str) -> Option<Task> {
        let prompt = format!(
            r#"A task failed during execution. Decide whether a corrected task could succeed.

Task: {}
Tool: {}
Args: {}
Error: {}

Respond with a JSON object:
{{"fixable": bool, "task": {{"description": "...", "tool": "...", "args": {{}}, "dependencies": []}} or null}}
Set "fixable" to false if no correction can work."#,
            failed_task.description,
            failed_task.tool.as_deref().unwrap_or("(none)"),
            serde_json::to_string(&failed_task.args).unwrap_or_default(),
            error,
        );

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "correction backend call failed");
                return None;
            }
        };

        match parse_llm_object::<RawCorrection>(&response) {
            Validated::Valid(raw) => {
                if !raw.fixable {
                    tracing::debug!(task = %failed_task.id, "backend declared task unfixable");
                    return None;
                }
                raw.task
                    .map(|t| t.into_task(format!("{}_fix", failed_task.id)))
            }
            Validated::Invalid(reason) => {
                tracing::debug!(reason = %reason, "correction response unparseable");
                None
            }
        }
    }

    /// 跨任务模式分析；解析失败时从任务错误确定性聚合
    pub async fn analyze_patterns(&self, tasks: &[Task]) -> PatternAnalysis {
        let summary: Vec<String> = tasks
            .iter()
            .map(|t| {
                format!(
                    "- {} [{:?}] tool={} error={}",
                    t.description,
                    t.status,
                    t.tool.as_deref().unwrap_or("-"),
                    t.error.as_deref().unwrap_or("-"),
                )
            })
            .collect();

        let prompt = format!(
            r#"Analyze these executed tasks for recurring failure and success patterns.

Tasks:
{}

Respond with a JSON object:
{{"common_issues": [], "success_patterns": [], "recommendations": []}}"#,
            summary.join("\n")
        );

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(_) => return fallback_patterns(tasks),
        };

        match parse_llm_object::<PatternAnalysis>(&response) {
            Validated::Valid(analysis) => analysis,
            Validated::Invalid(reason) => {
                tracing::debug!(reason = %reason, "pattern response rejected, aggregating locally");
                fallback_patterns(tasks)
            }
        }
    }

    /// 计划质量评估；解析失败时返回中性评分并注明评估不可用
    pub async fn evaluate_plan(&self, tasks: &[Task], context: &str) -> PlanEvaluation {
        let task_lines: Vec<String> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "{}. {} (tool: {}, deps: {:?})",
                    i + 1,
                    t.description,
                    t.tool.as_deref().unwrap_or("-"),
                    t.dependencies,
                )
            })
            .collect();

        let prompt = format!(
            r#"Evaluate this task plan before execution.

Context: {}

Plan:
{}

Respond with a JSON object:
{{"score": 0.0-1.0, "concerns": [], "improvements": []}}"#,
            context,
            task_lines.join("\n")
        );

        let response = match self.model.call(&prompt, self.model_hint.as_deref()).await {
            Ok(text) => text,
            Err(_) => return fallback_evaluation(),
        };

        match parse_llm_object::<PlanEvaluation>(&response) {
            Validated::Valid(mut eval) => {
                eval.score = eval.score.clamp(0.0, 1.0);
                eval
            }
            Validated::Invalid(reason) => {
                tracing::debug!(reason = %reason, "plan evaluation response rejected");
                fallback_evaluation()
            }
        }
    }
}

/// 由任务状态推导的确定性兜底反思
fn fallback_reflection(task: &Task) -> ReflectionResult {
    match task.status {
        TaskStatus::Completed => ReflectionResult {
            success: true,
            confidence: 0.8,
            issues: Vec::new(),
            suggestions: Vec::new(),
            should_retry: false,
            alternative: None,
        },
        TaskStatus::Failed => ReflectionResult {
            success: false,
            confidence: 0.0,
            issues: vec![task
                .error
                .clone()
                .unwrap_or_else(|| "task failed".to_string())],
            suggestions: Vec::new(),
            should_retry: true,
            alternative: None,
        },
        _ => ReflectionResult {
            success: false,
            confidence: 0.0,
            issues: vec!["task has not completed".to_string()],
            suggestions: Vec::new(),
            should_retry: false,
            alternative: None,
        },
    }
}

fn fallback_patterns(tasks: &[Task]) -> PatternAnalysis {
    let mut common_issues: Vec<String> = tasks
        .iter()
        .filter_map(|t| t.error.clone())
        .collect();
    common_issues.dedup();

    let completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let success_patterns = if completed > 0 {
        vec![format!("{} of {} tasks completed", completed, tasks.len())]
    } else {
        Vec::new()
    };

    PatternAnalysis {
        common_issues,
        success_patterns,
        recommendations: Vec::new(),
    }
}

fn fallback_evaluation() -> PlanEvaluation {
    PlanEvaluation {
        score: 0.5,
        concerns: vec!["evaluation unavailable".to_string()],
        improvements: Vec::new(),
    }
}

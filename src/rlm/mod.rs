//! 递归处理引擎
//!
//! 当单次模型调用无法吞下整个输入时，以四种策略递归分治：
//! map-reduce（最大变量切块并行映射后归并）、递归分解（模型自拆 2-5 个子任务，
//! 最小权限传递 needs 变量）、顺序累积（逐条目携带前一步结果）、树遍历（层级
//! 数据的直答标注，扩展点）。每次递归入口检查显式深度计数与墙钟截止时间，
//! 两者给出可区分的错误；协作式而非抢占式，在途调用不会被打断。
//! 所有叶子调用经共享 Semaphore 限流，与计划执行器使用同一并发上限。

pub mod chunker;
pub mod trajectory;

pub use chunker::{chunk_text, chunk_value, ChunkStrategy};
pub use trajectory::{CallStatus, RlmCall, Trajectory, TrajectoryRecorder};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::core::validate::{parse_llm_array, Validated};
use crate::core::OrchestratorError;
use crate::llm::ModelCaller;

/// 递归处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlmStrategy {
    /// 切块并行映射 + 归并
    MapReduce,
    /// 模型自行分解子任务后合并
    RecursiveDecomposition,
    /// 顺序迭代，显式累积器
    SequentialProcessing,
    /// 层级数据直答标注（最小实现，扩展点）
    TreeTraversal,
}

/// 递归处理配置
#[derive(Debug, Clone)]
pub struct RlmConfig {
    /// 最大递归深度（显式计数器，不依赖宿主调用栈）
    pub max_recursion_depth: usize,
    /// 墙钟时限（毫秒），入口处协作式检查
    pub max_execution_ms: u64,
    /// 最小分块阈值（字符）；最大变量低于此值时直接单次调用
    pub min_chunk_threshold: usize,
    /// 单块目标大小（字符）
    pub chunk_size: usize,
    /// 相邻块重叠（字符）
    pub chunk_overlap: usize,
    /// 拼入 prompt 时单变量序列化形式的上限（字符），超出截断并注明
    pub variable_truncate_chars: usize,
    /// 并发叶子调用上限（与计划执行器同一上限）
    pub concurrency_limit: usize,
}

impl Default for RlmConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 3,
            max_execution_ms: 120_000,
            min_chunk_threshold: 2_000,
            chunk_size: 4_000,
            chunk_overlap: 0,
            variable_truncate_chars: 4_000,
            concurrency_limit: 5,
        }
    }
}

/// 一次顶层 execute 的最终产出；失败时 trajectory 仍完整返回供诊断
#[derive(Debug)]
pub struct RlmOutcome {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<OrchestratorError>,
    pub trajectory: Trajectory,
    pub execution_time_ms: u64,
}

/// 递归状态：按值传递的深度计数与父调用 ID
#[derive(Debug, Clone)]
struct Frame {
    depth: usize,
    parent: Option<String>,
}

/// 模型应返回的子任务格式
#[derive(Debug, Deserialize)]
struct RawSubtask {
    subtask: String,
    #[serde(default)]
    needs: Vec<String>,
}

/// 递归处理执行器：模型调用器构造注入
pub struct RlmExecutor {
    model: Arc<dyn ModelCaller>,
    config: RlmConfig,
    chunk_strategy: ChunkStrategy,
    semaphore: Arc<Semaphore>,
}

impl RlmExecutor {
    pub fn new(model: Arc<dyn ModelCaller>) -> Self {
        let config = RlmConfig::default();
        let semaphore = Arc::new(Semaphore::new(config.concurrency_limit.max(1)));
        Self {
            model,
            chunk_strategy: ChunkStrategy::FixedSize {
                size: config.chunk_size,
                overlap: config.chunk_overlap,
            },
            config,
            semaphore,
        }
    }

    pub fn with_config(mut self, config: RlmConfig) -> Self {
        self.semaphore = Arc::new(Semaphore::new(config.concurrency_limit.max(1)));
        self.chunk_strategy = ChunkStrategy::FixedSize {
            size: config.chunk_size,
            overlap: config.chunk_overlap,
        };
        self.config = config;
        self
    }

    pub fn with_chunk_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.chunk_strategy = strategy;
        self
    }

    /// 顶层入口：执行任务并返回结果与完整轨迹
    pub async fn execute(
        &self,
        task: &str,
        variables: HashMap<String, Value>,
        strategy: RlmStrategy,
    ) -> RlmOutcome {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.config.max_execution_ms);
        let recorder = TrajectoryRecorder::new();
        let frame = Frame {
            depth: 0,
            parent: None,
        };

        let result = self
            .process(task.to_string(), variables, strategy, frame, deadline, &recorder)
            .await;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        let trajectory = recorder.finish(execution_time_ms);

        match result {
            Ok(text) => RlmOutcome {
                success: true,
                result: Some(text),
                error: None,
                trajectory,
                execution_time_ms,
            },
            Err(e) => {
                tracing::warn!(error = %e, calls = trajectory.total_calls, "rlm execution failed");
                RlmOutcome {
                    success: false,
                    result: None,
                    error: Some(e),
                    trajectory,
                    execution_time_ms,
                }
            }
        }
    }

    /// 递归主体：入口处检查深度与截止时间；最大变量低于阈值时
    /// 无论选定何种策略都退化为单次直接调用
    fn process<'a>(
        &'a self,
        task: String,
        variables: HashMap<String, Value>,
        strategy: RlmStrategy,
        frame: Frame,
        deadline: Instant,
        recorder: &'a TrajectoryRecorder,
    ) -> BoxFuture<'a, Result<String, OrchestratorError>> {
        async move {
            if frame.depth > self.config.max_recursion_depth {
                return Err(OrchestratorError::DepthExceeded(frame.depth));
            }
            if Instant::now() >= deadline {
                return Err(OrchestratorError::DeadlineExceeded(self.config.max_execution_ms));
            }

            let largest = largest_variable(&variables);
            let Some((target, size)) = largest else {
                let (_, text) = self.call_model(&task, &variables, &frame, recorder).await?;
                return Ok(text);
            };
            if size < self.config.min_chunk_threshold {
                let (_, text) = self.call_model(&task, &variables, &frame, recorder).await?;
                return Ok(text);
            }

            match strategy {
                RlmStrategy::MapReduce => {
                    self.map_reduce(task, variables, target, frame, deadline, recorder)
                        .await
                }
                RlmStrategy::RecursiveDecomposition => {
                    self.decompose(task, variables, frame, deadline, recorder).await
                }
                RlmStrategy::SequentialProcessing => {
                    self.sequential(task, variables, target, frame, deadline, recorder)
                        .await
                }
                RlmStrategy::TreeTraversal => {
                    let annotated = format!(
                        "{}\n\n(The context holds hierarchical data; traverse it level by level.)",
                        task
                    );
                    let (_, text) = self
                        .call_model(&annotated, &variables, &frame, recorder)
                        .await?;
                    Ok(text)
                }
            }
        }
        .boxed()
    }

    /// map-reduce：切块并行映射（每块只见自己的块与任务描述），单次归并调用收尾。
    /// 任一块失败即整体失败，已发生的调用全部留在轨迹里。
    async fn map_reduce(
        &self,
        task: String,
        variables: HashMap<String, Value>,
        target: String,
        frame: Frame,
        deadline: Instant,
        recorder: &TrajectoryRecorder,
    ) -> Result<String, OrchestratorError> {
        let value = variables.get(&target).cloned().unwrap_or(Value::Null);
        let chunks = chunk_value(&value, &self.chunk_strategy, self.config.chunk_size);
        if chunks.len() <= 1 {
            let (_, text) = self.call_model(&task, &variables, &frame, recorder).await?;
            return Ok(text);
        }

        let total = chunks.len();
        let orch_id = recorder.begin(
            &format!("map-reduce '{}' across {} chunks: {}", target, total, task),
            frame.depth,
            frame.parent.as_deref(),
        );
        let child_depth = frame.depth + 1;

        let futures = chunks.into_iter().enumerate().map(|(i, chunk)| {
            let mut child_vars = HashMap::new();
            child_vars.insert(target.clone(), chunk);
            let child_task = format!(
                "{}\n\n(Processing part {} of {} of '{}'.)",
                task,
                i + 1,
                total,
                target
            );
            let child_frame = Frame {
                depth: child_depth,
                parent: Some(orch_id.clone()),
            };
            self.process(
                child_task,
                child_vars,
                RlmStrategy::MapReduce,
                child_frame,
                deadline,
                recorder,
            )
        });

        let mut partials = Vec::with_capacity(total);
        for result in join_all(futures).await {
            match result {
                Ok(text) => partials.push(text),
                Err(e) => {
                    recorder.fail(&orch_id, &e.to_string());
                    return Err(e);
                }
            }
        }

        let mut reduce_vars = HashMap::new();
        reduce_vars.insert(
            "partial_results".to_string(),
            Value::Array(partials.into_iter().map(Value::String).collect()),
        );
        let reduce_task = format!(
            "Synthesize one final answer for the original task from the partial results.\n\nOriginal task: {}",
            task
        );
        let reduce_frame = Frame {
            depth: child_depth,
            parent: Some(orch_id.clone()),
        };
        match self
            .call_model(&reduce_task, &reduce_vars, &reduce_frame, recorder)
            .await
        {
            Ok((_, text)) => {
                recorder.complete(&orch_id, &text);
                Ok(text)
            }
            Err(e) => {
                recorder.fail(&orch_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// 递归分解：模型把任务拆为 2-5 个子任务（JSON 数组），子任务只见声明的
    /// needs 变量；分解响应不可解析时退化为单次直接调用，从不崩溃。
    async fn decompose(
        &self,
        task: String,
        variables: HashMap<String, Value>,
        frame: Frame,
        deadline: Instant,
        recorder: &TrajectoryRecorder,
    ) -> Result<String, OrchestratorError> {
        let mut names: Vec<&String> = variables.keys().collect();
        names.sort();
        let decompose_task = format!(
            r#"Decompose the following task into 2-5 independent subtasks.

Task: {}
Available variables: {:?}

Respond with a JSON array:
[{{"subtask": "description", "needs": ["variable names this subtask requires"]}}]"#,
            task, names
        );

        let (decompose_id, response) = self
            .call_model(&decompose_task, &HashMap::new(), &frame, recorder)
            .await?;

        let subtasks: Vec<RawSubtask> = match parse_llm_array(&response) {
            Validated::Valid(v) if !v.is_empty() => v,
            Validated::Valid(_) | Validated::Invalid(_) => {
                tracing::warn!("decomposition response rejected, degrading to direct call");
                let (_, text) = self.call_model(&task, &variables, &frame, recorder).await?;
                return Ok(text);
            }
        };

        let child_depth = frame.depth + 1;
        let futures = subtasks.iter().map(|subtask| {
            let child_vars: HashMap<String, Value> = variables
                .iter()
                .filter(|(name, _)| subtask.needs.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            let child_frame = Frame {
                depth: child_depth,
                parent: Some(decompose_id.clone()),
            };
            self.process(
                subtask.subtask.clone(),
                child_vars,
                RlmStrategy::RecursiveDecomposition,
                child_frame,
                deadline,
                recorder,
            )
        });

        let mut partials = Vec::with_capacity(subtasks.len());
        for (subtask, result) in subtasks.iter().zip(join_all(futures).await) {
            match result {
                Ok(text) => partials.push(serde_json::json!({
                    "subtask": subtask.subtask,
                    "result": text,
                })),
                Err(e) => return Err(e),
            }
        }

        let mut combine_vars = HashMap::new();
        combine_vars.insert("subtask_results".to_string(), Value::Array(partials));
        let combine_task = format!(
            "Combine the subtask results into one final answer.\n\nOriginal task: {}",
            task
        );
        let combine_frame = Frame {
            depth: child_depth,
            parent: Some(decompose_id),
        };
        let (_, text) = self
            .call_model(&combine_task, &combine_vars, &combine_frame, recorder)
            .await?;
        Ok(text)
    }

    /// 顺序累积：逐条目处理，前一步结果作为 previous_result 传入下一步；
    /// 显式累积器，不并行，每步前检查截止时间。
    async fn sequential(
        &self,
        task: String,
        variables: HashMap<String, Value>,
        target: String,
        frame: Frame,
        deadline: Instant,
        recorder: &TrajectoryRecorder,
    ) -> Result<String, OrchestratorError> {
        let value = variables.get(&target).cloned().unwrap_or(Value::Null);
        let items: Vec<Value> = match value {
            Value::Array(items) => items,
            Value::String(s) => chunk_text(&s, &self.chunk_strategy)
                .into_iter()
                .map(Value::String)
                .collect(),
            other => vec![other],
        };
        if items.len() <= 1 {
            let (_, text) = self.call_model(&task, &variables, &frame, recorder).await?;
            return Ok(text);
        }

        let total = items.len();
        let orch_id = recorder.begin(
            &format!("sequential over '{}' ({} items): {}", target, total, task),
            frame.depth,
            frame.parent.as_deref(),
        );
        let step_frame = Frame {
            depth: frame.depth + 1,
            parent: Some(orch_id.clone()),
        };

        let mut previous: Option<String> = None;
        for (i, item) in items.into_iter().enumerate() {
            if Instant::now() >= deadline {
                let e = OrchestratorError::DeadlineExceeded(self.config.max_execution_ms);
                recorder.fail(&orch_id, &e.to_string());
                return Err(e);
            }

            let mut step_vars = HashMap::new();
            step_vars.insert(target.clone(), item);
            if let Some(prev) = &previous {
                step_vars.insert("previous_result".to_string(), Value::String(prev.clone()));
            }
            let step_task = format!(
                "{}\n\n(Step {} of {}; build on previous_result when present.)",
                task,
                i + 1,
                total
            );

            match self
                .call_model(&step_task, &step_vars, &step_frame, recorder)
                .await
            {
                Ok((_, text)) => previous = Some(text),
                Err(e) => {
                    recorder.fail(&orch_id, &e.to_string());
                    return Err(e);
                }
            }
        }

        let final_result = previous.unwrap_or_default();
        recorder.complete(&orch_id, &final_result);
        Ok(final_result)
    }

    /// 叶子调用：经 Semaphore 限流，prompt 由任务文本与序列化上下文变量拼成，
    /// 单变量超过上限时截断并注明，保证结果可解释
    async fn call_model(
        &self,
        task: &str,
        variables: &HashMap<String, Value>,
        frame: &Frame,
        recorder: &TrajectoryRecorder,
    ) -> Result<(String, String), OrchestratorError> {
        let prompt = self.build_prompt(task, variables);
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        let call_id = recorder.begin(&prompt, frame.depth, frame.parent.as_deref());
        match self.model.call(&prompt, None).await {
            Ok(text) => {
                recorder.complete(&call_id, &text);
                Ok((call_id, text))
            }
            Err(e) => {
                recorder.fail(&call_id, &e);
                Err(OrchestratorError::LlmError(e))
            }
        }
    }

    fn build_prompt(&self, task: &str, variables: &HashMap<String, Value>) -> String {
        let mut out = format!("Task: {}", task);
        if variables.is_empty() {
            return out;
        }

        out.push_str("\n\nContext variables:");
        let mut names: Vec<&String> = variables.keys().collect();
        names.sort();
        let ceiling = self.config.variable_truncate_chars;
        for name in names {
            let serialized = match &variables[name] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let total = serialized.chars().count();
            if total > ceiling {
                let shown: String = serialized.chars().take(ceiling).collect();
                out.push_str(&format!(
                    "\n{} = {} [truncated, showing {} of {} chars]",
                    name, shown, ceiling, total
                ));
            } else {
                out.push_str(&format!("\n{} = {}", name, serialized));
            }
        }
        out
    }
}

/// 序列化后最大的变量（按字节长度；键名排序保证平局时结果确定）
fn largest_variable(variables: &HashMap<String, Value>) -> Option<(String, usize)> {
    let mut entries: Vec<(&String, usize)> = variables
        .iter()
        .map(|(name, value)| {
            let len = match value {
                Value::String(s) => s.len(),
                other => other.to_string().len(),
            };
            (name, len)
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .max_by_key(|(_, len)| *len)
        .map(|(name, len)| (name.clone(), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModelCaller;

    fn small_config() -> RlmConfig {
        RlmConfig {
            max_recursion_depth: 3,
            max_execution_ms: 10_000,
            min_chunk_threshold: 10,
            chunk_size: 5,
            chunk_overlap: 0,
            variable_truncate_chars: 100,
            concurrency_limit: 5,
        }
    }

    fn vars_with(name: &str, value: Value) -> HashMap<String, Value> {
        let mut vars = HashMap::new();
        vars.insert(name.to_string(), value);
        vars
    }

    #[tokio::test]
    async fn test_below_threshold_makes_one_call_regardless_of_strategy() {
        for strategy in [
            RlmStrategy::MapReduce,
            RlmStrategy::RecursiveDecomposition,
            RlmStrategy::SequentialProcessing,
            RlmStrategy::TreeTraversal,
        ] {
            let model = Arc::new(ScriptedModelCaller::new());
            model.push_ok("answer");
            let executor = RlmExecutor::new(model.clone()).with_config(small_config());

            let outcome = executor
                .execute("summarize", vars_with("doc", Value::String("tiny".into())), strategy)
                .await;

            assert!(outcome.success, "strategy {:?} failed", strategy);
            assert_eq!(outcome.trajectory.total_calls, 1, "strategy {:?}", strategy);
            assert_eq!(model.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_map_reduce_fans_out_and_reduces() {
        let model = Arc::new(ScriptedModelCaller::new());
        for i in 1..=4 {
            model.push_ok(format!("part{}", i));
        }
        model.push_ok("final synthesis");

        let executor = RlmExecutor::new(model.clone()).with_config(small_config());
        let outcome = executor
            .execute(
                "summarize the document",
                vars_with("doc", Value::String("abcdefghijklmnopqrst".into())),
                RlmStrategy::MapReduce,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("final synthesis"));
        // 1 编排节点 + 4 映射 + 1 归并
        assert_eq!(outcome.trajectory.total_calls, 6);
        assert_eq!(outcome.trajectory.max_depth, 1);
        // 归并调用能看到全部分片结果
        let reduce_prompt = model.prompts().last().unwrap().clone();
        for i in 1..=4 {
            assert!(reduce_prompt.contains(&format!("part{}", i)));
        }
    }

    #[tokio::test]
    async fn test_map_reduce_failed_chunk_fails_whole_run_with_trajectory() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok("part1");
        model.push_err("chunk backend exploded");
        for i in 3..=10 {
            model.push_ok(format!("part{}", i));
        }

        // 50 字符 / 块大小 5 -> 10 个分块，无重试
        let executor = RlmExecutor::new(model).with_config(small_config());
        let outcome = executor
            .execute(
                "summarize",
                vars_with("doc", Value::String("abcde".repeat(10))),
                RlmStrategy::MapReduce,
            )
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(OrchestratorError::LlmError(_))));
        // 编排节点 + 10 次映射尝试全部入轨迹，归并未发生
        assert_eq!(outcome.trajectory.total_calls, 11);
        let failed = outcome
            .trajectory
            .calls
            .iter()
            .filter(|c| c.status == CallStatus::Failed)
            .count();
        assert_eq!(failed, 2); // 失败的映射调用 + 编排节点
    }

    #[tokio::test]
    async fn test_depth_zero_rejects_recursion_distinctly() {
        let model = Arc::new(ScriptedModelCaller::new());
        let mut config = small_config();
        config.max_recursion_depth = 0;
        let executor = RlmExecutor::new(model).with_config(config);

        let outcome = executor
            .execute(
                "summarize",
                vars_with("doc", Value::String("abcdefghijklmnopqrst".into())),
                RlmStrategy::MapReduce,
            )
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(OrchestratorError::DepthExceeded(_))));
    }

    #[tokio::test]
    async fn test_deadline_zero_rejects_with_deadline_error() {
        let model = Arc::new(ScriptedModelCaller::new());
        let mut config = small_config();
        config.max_execution_ms = 0;
        let executor = RlmExecutor::new(model).with_config(config);

        let outcome = executor
            .execute(
                "anything",
                vars_with("doc", Value::String("tiny".into())),
                RlmStrategy::MapReduce,
            )
            .await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(OrchestratorError::DeadlineExceeded(_))
        ));
        assert_eq!(outcome.trajectory.total_calls, 0);
    }

    #[tokio::test]
    async fn test_decomposition_runs_subtasks_and_combines() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok(
            r#"[{"subtask": "count the words", "needs": []},
                {"subtask": "list the headings", "needs": []}]"#,
        );
        model.push_ok("42 words");
        model.push_ok("3 headings");
        model.push_ok("combined report");

        let executor = RlmExecutor::new(model.clone()).with_config(small_config());
        let outcome = executor
            .execute(
                "analyze the document",
                vars_with("doc", Value::String("abcdefghijklmnopqrst".into())),
                RlmStrategy::RecursiveDecomposition,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("combined report"));
        // 分解请求 + 2 子任务 + 合并
        assert_eq!(outcome.trajectory.total_calls, 4);
        let combine_prompt = model.prompts().last().unwrap().clone();
        assert!(combine_prompt.contains("42 words"));
        assert!(combine_prompt.contains("3 headings"));
    }

    #[tokio::test]
    async fn test_malformed_decomposition_degrades_to_direct_call() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok("I refuse to produce JSON");
        model.push_ok("direct answer");

        let executor = RlmExecutor::new(model).with_config(small_config());
        let outcome = executor
            .execute(
                "analyze",
                vars_with("doc", Value::String("abcdefghijklmnopqrst".into())),
                RlmStrategy::RecursiveDecomposition,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("direct answer"));
        assert_eq!(outcome.trajectory.total_calls, 2);
    }

    #[tokio::test]
    async fn test_sequential_carries_accumulator_forward() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok("r1");
        model.push_ok("r2");
        model.push_ok("r3");

        let items = Value::Array(vec![
            Value::String("aaaaa".into()),
            Value::String("bbbbb".into()),
            Value::String("ccccc".into()),
        ]);
        let executor = RlmExecutor::new(model.clone()).with_config(small_config());
        let outcome = executor
            .execute(
                "process entries in order",
                vars_with("entries", items),
                RlmStrategy::SequentialProcessing,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("r3"));
        // 编排节点 + 3 步
        assert_eq!(outcome.trajectory.total_calls, 4);

        let prompts = model.prompts();
        assert!(!prompts[0].contains("previous_result"));
        assert!(prompts[1].contains("previous_result"));
        assert!(prompts[1].contains("r1"));
        assert!(prompts[2].contains("r2"));
    }

    #[tokio::test]
    async fn test_variable_truncation_is_annotated() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok("ok");

        let mut config = small_config();
        config.min_chunk_threshold = 100_000; // 强制直答
        config.variable_truncate_chars = 10;
        let executor = RlmExecutor::new(model.clone()).with_config(config);

        let outcome = executor
            .execute(
                "look",
                vars_with("doc", Value::String("x".repeat(50))),
                RlmStrategy::MapReduce,
            )
            .await;

        assert!(outcome.success);
        let prompt = model.prompts()[0].clone();
        assert!(prompt.contains("[truncated, showing 10 of 50 chars]"));
    }
}

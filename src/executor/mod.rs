//! 计划执行器
//!
//! 按计划策略走三种调度模式：Sequential 顺序执行首败即停；Parallel 按并发上限
//! 分批、整批等待且绝不中止同批任务；Mixed 为完成驱动的就绪集循环，每有一个
//! 在途任务完成就重算就绪集。依赖结果通过 `${taskId.path}` 占位符注入参数包，
//! 失败任务在重试预算内重试，预算耗尽记为 Failed；就绪集与在途同时为空而仍有
//! Pending 任务时判定死锁，将其标记为 Skipped 而非悬挂。

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::{ExecutionStrategy, PlanStatus, Task, TaskPlan, TaskStatus};
use crate::llm::ModelCaller;
use crate::tools::ToolExecutor;

/// 执行器配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 同时在途任务上限
    pub concurrency_limit: usize,
    /// 单任务重试预算（不含首次尝试）
    pub max_retries: u32,
    /// 重试退避基数（毫秒）；0 表示立即重试（与原始行为一致）
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_retries: 2,
            retry_backoff_ms: 0,
        }
    }
}

/// 执行报告：整体成败、按任务 ID 的结果映射、失败任务快照
#[derive(Debug)]
pub struct ExecutionReport {
    pub success: bool,
    pub results: HashMap<String, Value>,
    pub failed_tasks: Vec<Task>,
}

type TaskHook = Arc<dyn Fn(&Task) + Send + Sync>;
type TaskFailedHook = Arc<dyn Fn(&Task, &str) + Send + Sync>;

/// 观察回调：即发即忘，不得阻塞调度循环
#[derive(Clone, Default)]
pub struct ExecutorHooks {
    pub on_progress: Option<TaskHook>,
    pub on_task_complete: Option<TaskHook>,
    pub on_task_failed: Option<TaskFailedHook>,
}

impl ExecutorHooks {
    fn progress(&self, task: &Task) {
        if let Some(hook) = &self.on_progress {
            hook(task);
        }
    }

    fn complete(&self, task: &Task) {
        if let Some(hook) = &self.on_task_complete {
            hook(task);
        }
    }

    fn failed(&self, task: &Task, error: &str) {
        if let Some(hook) = &self.on_task_failed {
            hook(task, error);
        }
    }
}

/// 单次任务尝试的产出：任务 ID、结果或错误、实际用掉的重试次数
struct TaskOutcome {
    task_id: String,
    result: Result<Value, String>,
    retries: u32,
}

/// 计划执行器：工具注册表与模型调用器由构造注入，不使用全局单例
pub struct PlanExecutor {
    tools: Arc<ToolExecutor>,
    model: Arc<dyn ModelCaller>,
    config: ExecutorConfig,
    hooks: ExecutorHooks,
    cancel_token: CancellationToken,
}

impl PlanExecutor {
    pub fn new(tools: Arc<ToolExecutor>, model: Arc<dyn ModelCaller>) -> Self {
        Self {
            tools,
            model,
            config: ExecutorConfig::default(),
            hooks: ExecutorHooks::default(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: ExecutorHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// 执行整个计划，按任务记录终态；计划仅在零失败时记为 Completed
    pub async fn execute_plan(&self, plan: &mut TaskPlan) -> ExecutionReport {
        plan.status = PlanStatus::Executing;
        let mut results: HashMap<String, Value> = HashMap::new();

        match plan.strategy {
            ExecutionStrategy::Sequential => self.run_sequential(plan, &mut results).await,
            ExecutionStrategy::Parallel => self.run_parallel(plan, &mut results).await,
            ExecutionStrategy::Mixed => self.run_mixed(plan, &mut results).await,
        }

        plan.completed_tasks = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let failed_tasks: Vec<Task> = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .cloned()
            .collect();
        plan.status = if failed_tasks.is_empty() {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };

        ExecutionReport {
            success: failed_tasks.is_empty(),
            results,
            failed_tasks,
        }
    }

    /// 顺序模式：按计划顺序执行，首个失败停止后续任务
    async fn run_sequential(&self, plan: &mut TaskPlan, results: &mut HashMap<String, Value>) {
        for i in 0..plan.tasks.len() {
            if self.cancel_token.is_cancelled() {
                mark_skipped_from(plan, i, "cancelled");
                return;
            }

            let snapshot = self.start_task(&mut plan.tasks[i], results);
            let outcome = self.run_task(snapshot, results.clone()).await;
            let failed = outcome.result.is_err();
            self.record_outcome(plan, results, outcome);
            if failed {
                return;
            }
        }
    }

    /// 并行模式：按并发上限分固定批，整批等待后再开下一批
    async fn run_parallel(&self, plan: &mut TaskPlan, results: &mut HashMap<String, Value>) {
        let batch_size = self.config.concurrency_limit.max(1);
        let task_count = plan.tasks.len();

        let mut start = 0;
        while start < task_count {
            if self.cancel_token.is_cancelled() {
                mark_skipped_from(plan, start, "cancelled");
                return;
            }
            let end = (start + batch_size).min(task_count);

            let mut futures = Vec::with_capacity(end - start);
            for i in start..end {
                let snapshot = self.start_task(&mut plan.tasks[i], results);
                futures.push(self.run_task(snapshot, results.clone()));
            }
            for outcome in join_all(futures).await {
                self.record_outcome(plan, results, outcome);
            }
            start = end;
        }
    }

    /// 混合模式：就绪集循环；依赖全部有结果的 Pending 任务并发启动，
    /// 每等到一个完成就重算就绪集。无就绪且无在途时剩余 Pending 判为死锁。
    async fn run_mixed(&self, plan: &mut TaskPlan, results: &mut HashMap<String, Value>) {
        let mut in_flight = FuturesUnordered::new();

        loop {
            if self.cancel_token.is_cancelled() {
                // 等掉在途任务再统一收尾，不中断兄弟任务
                while let Some(outcome) = in_flight.next().await {
                    self.record_outcome(plan, results, outcome);
                }
                mark_pending_skipped(plan, "cancelled");
                return;
            }

            while in_flight.len() < self.config.concurrency_limit.max(1) {
                let Some(idx) = next_ready(plan, results) else {
                    break;
                };
                let snapshot = self.start_task(&mut plan.tasks[idx], results);
                in_flight.push(self.run_task(snapshot, results.clone()));
            }

            if in_flight.is_empty() {
                let pending = plan
                    .tasks
                    .iter()
                    .any(|t| t.status == TaskStatus::Pending);
                if pending {
                    mark_pending_skipped(plan, "unmet dependency (deadlock)");
                }
                return;
            }

            if let Some(outcome) = in_flight.next().await {
                self.record_outcome(plan, results, outcome);
            }
        }
    }

    /// 标记任务进入执行、注入依赖结果，返回执行快照
    fn start_task(&self, task: &mut Task, results: &HashMap<String, Value>) -> Task {
        task.status = TaskStatus::InProgress;
        task.started_at = Some(chrono::Utc::now().timestamp_millis());
        task.args = resolve_args(&task.args, results);
        self.hooks.progress(task);
        task.clone()
    }

    /// 执行单个任务：绑定工具走工具执行器，无工具走模型直答；在重试预算内重试
    async fn run_task(&self, task: Task, results: HashMap<String, Value>) -> TaskOutcome {
        let mut last_error = String::new();
        let max_attempts = self.config.max_retries + 1;

        for attempt in 0..max_attempts {
            if attempt > 0 && self.config.retry_backoff_ms > 0 {
                // 带上限的指数退避：base * 2^(attempt-1)，上限 30s
                let backoff = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(1u64 << (attempt - 1).min(10))
                    .min(30_000);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let attempt_result = match &task.tool {
                Some(tool) => self.invoke_tool(tool, &task).await,
                None => self.invoke_model(&task, &results).await,
            };

            match attempt_result {
                Ok(value) => {
                    return TaskOutcome {
                        task_id: task.id.clone(),
                        result: Ok(value),
                        retries: attempt,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        task = %task.id,
                        attempt = attempt + 1,
                        error = %e,
                        "task attempt failed"
                    );
                    last_error = e;
                }
            }
        }

        TaskOutcome {
            task_id: task.id.clone(),
            result: Err(last_error),
            retries: self.config.max_retries,
        }
    }

    async fn invoke_tool(&self, tool: &str, task: &Task) -> Result<Value, String> {
        let args = Value::Object(task.args.clone().into_iter().collect());
        let output = self
            .tools
            .execute(tool, args)
            .await
            .map_err(|e| e.to_string())?;
        Ok(parse_tool_output(&output))
    }

    async fn invoke_model(
        &self,
        task: &Task,
        results: &HashMap<String, Value>,
    ) -> Result<Value, String> {
        let mut prompt = task.description.clone();
        if !task.args.is_empty() {
            let args = serde_json::to_string(&task.args).unwrap_or_default();
            prompt.push_str(&format!("\n\nInputs: {}", args));
        }
        for dep in &task.dependencies {
            if let Some(value) = results.get(dep) {
                prompt.push_str(&format!("\n\nResult of '{}': {}", dep, stringify(value)));
            }
        }
        let response = self.model.call(&prompt, None).await?;
        Ok(Value::String(response))
    }

    /// 把任务产出写回计划与结果映射，并触发回调；每个任务 ID 只写一次结果
    fn record_outcome(
        &self,
        plan: &mut TaskPlan,
        results: &mut HashMap<String, Value>,
        outcome: TaskOutcome,
    ) {
        let Some(task) = plan.task_mut(&outcome.task_id) else {
            return;
        };
        task.retry_count = outcome.retries;
        task.completed_at = Some(chrono::Utc::now().timestamp_millis());

        match outcome.result {
            Ok(value) => {
                task.status = TaskStatus::Completed;
                task.result = Some(value.clone());
                results.insert(outcome.task_id, value);
                let snapshot = task.clone();
                self.hooks.complete(&snapshot);
            }
            Err(error) => {
                task.status = TaskStatus::Failed;
                task.error = Some(error.clone());
                let snapshot = task.clone();
                self.hooks.failed(&snapshot, &error);
            }
        }
    }
}

/// 就绪判定：Pending 且所有依赖都已有记录结果（启动即转 InProgress，不会重复选中）
fn next_ready(plan: &TaskPlan, results: &HashMap<String, Value>) -> Option<usize> {
    plan.tasks.iter().position(|t| {
        t.status == TaskStatus::Pending
            && t.dependencies.iter().all(|d| results.contains_key(d))
    })
}

fn mark_pending_skipped(plan: &mut TaskPlan, reason: &str) {
    for task in &mut plan.tasks {
        if task.status == TaskStatus::Pending {
            task.status = TaskStatus::Skipped;
            task.error = Some(reason.to_string());
        }
    }
}

fn mark_skipped_from(plan: &mut TaskPlan, start: usize, reason: &str) {
    for task in plan.tasks.iter_mut().skip(start) {
        if task.status == TaskStatus::Pending {
            task.status = TaskStatus::Skipped;
            task.error = Some(reason.to_string());
        }
    }
}

/// 工具输出优先按 JSON 解析，失败时按原文存为字符串
fn parse_tool_output(output: &str) -> Value {
    serde_json::from_str(output).unwrap_or_else(|_| Value::String(output.to_string()))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 将参数包中的 `${taskId.path}` 占位符替换为依赖结果：
/// 整串恰为单个占位符时保留 JSON 类型，否则内联为字符串
fn resolve_args(
    args: &HashMap<String, Value>,
    results: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    args.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, results)))
        .collect()
}

fn resolve_value(value: &Value, results: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_placeholders(s, results),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, results)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z0-9_\-]+)(?:\.([A-Za-z0-9_\-.]+))?\}")
            .expect("placeholder regex is valid")
    })
}

fn resolve_placeholders(text: &str, results: &HashMap<String, Value>) -> Value {
    let re = placeholder_re();

    // 整串恰为一个占位符：保留依赖结果的 JSON 类型
    if let Some(caps) = re.captures(text) {
        if caps.get(0).map(|m| m.as_str()) == Some(text) {
            if let Some(value) = lookup(&caps, results) {
                return value;
            }
        }
    }

    let replaced = re.replace_all(text, |caps: &regex::Captures| {
        lookup(caps, results)
            .map(|v| stringify(&v))
            .unwrap_or_else(|| caps[0].to_string())
    });
    Value::String(replaced.into_owned())
}

fn lookup(caps: &regex::Captures, results: &HashMap<String, Value>) -> Option<Value> {
    let root = results.get(&caps[1])?;
    match caps.get(2) {
        None => Some(root.clone()),
        Some(path) => {
            let mut current = root;
            for segment in path.as_str().split('.') {
                current = match current {
                    Value::Object(map) => map.get(segment)?,
                    Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
            Some(current.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::core::{ExecutionStrategy, PlanBuilder};
    use crate::llm::{MockModelCaller, ScriptedModelCaller};
    use crate::tools::{Tool, ToolRegistry};

    /// 记录并发水位的工具：execute 内短暂停留放大并发窗口
    struct GaugeTool {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for GaugeTool {
        fn name(&self) -> &str {
            "gauge"
        }
        fn description(&self) -> &str {
            "records concurrency watermark"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    /// 前 N 次失败随后成功的工具
    struct FlakyTool {
        failures_left: Mutex<u32>,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "fails a few times then succeeds"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                Err("transient failure".to_string())
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    struct AlwaysFailTool;

    #[async_trait]
    impl Tool for AlwaysFailTool {
        fn name(&self) -> &str {
            "always_fail"
        }
        fn description(&self) -> &str {
            "fails every time"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("permanent failure".to_string())
        }
    }

    fn tool_executor(registry: ToolRegistry) -> Arc<ToolExecutor> {
        Arc::new(ToolExecutor::new(registry, 5))
    }

    fn echo_executor() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(crate::tools::EchoTool);
        tool_executor(registry)
    }

    #[tokio::test]
    async fn test_mixed_runs_dependencies_then_dependent() {
        let mut plan = PlanBuilder::new("diamond")
            .task("a", "first").tool("echo").arg("text", Value::String("A".into()))
            .task("b", "second").tool("echo").arg("text", Value::String("B".into()))
            .task("c", "join").tool("echo").arg("text", Value::String("${a} and ${b}".into()))
            .depends_on("c", &["a", "b"])
            .strategy(ExecutionStrategy::Mixed)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(echo_executor(), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                concurrency_limit: 2,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert_eq!(plan.completed_tasks, 3);
        assert_eq!(report.results.get("c").unwrap(), &Value::String("A and B".into()));
    }

    #[tokio::test]
    async fn test_concurrency_limit_never_exceeded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(GaugeTool {
            current: current.clone(),
            peak: peak.clone(),
        });

        let mut builder = PlanBuilder::new("load");
        for i in 0..6 {
            builder = builder.task(format!("t{}", i), "probe").tool("gauge");
        }
        let mut plan = builder.strategy(ExecutionStrategy::Mixed).build().unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                concurrency_limit: 2,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak concurrency exceeded limit");
    }

    #[tokio::test]
    async fn test_parallel_batches_respect_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(GaugeTool {
            current: current.clone(),
            peak: peak.clone(),
        });

        let mut builder = PlanBuilder::new("load");
        for i in 0..7 {
            builder = builder.task(format!("t{}", i), "probe").tool("gauge");
        }
        let mut plan = builder.strategy(ExecutionStrategy::Parallel).build().unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                concurrency_limit: 3,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(plan.completed_tasks, 7);
    }

    #[tokio::test]
    async fn test_sequential_fail_fast() {
        let mut registry = ToolRegistry::new();
        registry.register(AlwaysFailTool);
        registry.register(crate::tools::EchoTool);

        let mut plan = PlanBuilder::new("chain")
            .task("bad", "will fail").tool("always_fail")
            .task("after", "never runs").tool("echo").arg("text", Value::String("x".into()))
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 0,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(!report.success);
        assert_eq!(report.failed_tasks.len(), 1);
        assert_eq!(plan.task("after").unwrap().status, TaskStatus::Pending);
        assert_eq!(
            plan.task("bad").unwrap().error.as_deref(),
            Some("Tool execution failed: permanent failure")
        );
    }

    #[tokio::test]
    async fn test_unmet_dependency_terminates_with_skip() {
        let mut registry = ToolRegistry::new();
        registry.register(AlwaysFailTool);
        registry.register(crate::tools::EchoTool);

        let mut plan = PlanBuilder::new("doomed")
            .task("bad", "fails").tool("always_fail")
            .task("blocked", "depends on bad").tool("echo").arg("text", Value::String("x".into()))
            .depends_on("blocked", &["bad"])
            .task("free", "independent").tool("echo").arg("text", Value::String("y".into()))
            .strategy(ExecutionStrategy::Mixed)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 0,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(!report.success);
        // 无关任务照常完成
        assert_eq!(plan.task("free").unwrap().status, TaskStatus::Completed);
        let blocked = plan.task("blocked").unwrap();
        assert_eq!(blocked.status, TaskStatus::Skipped);
        assert!(blocked.error.as_deref().unwrap().contains("unmet dependency"));
    }

    #[tokio::test]
    async fn test_retry_budget_recovers_flaky_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(FlakyTool {
            failures_left: Mutex::new(2),
        });

        let mut plan = PlanBuilder::new("flaky")
            .task("t", "transient").tool("flaky")
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 2,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert_eq!(plan.task("t").unwrap().retry_count, 2);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_records_last_error() {
        let mut registry = ToolRegistry::new();
        registry.register(AlwaysFailTool);

        let mut plan = PlanBuilder::new("fail")
            .task("t", "never works").tool("always_fail")
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 1,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;

        assert!(!report.success);
        let task = plan.task("t").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("permanent failure"));
    }

    #[tokio::test]
    async fn test_taskless_task_goes_to_model() {
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok("direct answer");

        let mut plan = PlanBuilder::new("direct")
            .task("t", "answer the question")
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(echo_executor(), model);
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert_eq!(
            report.results.get("t").unwrap(),
            &Value::String("direct answer".into())
        );
    }

    #[tokio::test]
    async fn test_placeholder_path_navigation() {
        let mut registry = ToolRegistry::new();
        registry.register(crate::tools::EchoTool);

        // echo 输出合法 JSON 时结果按结构化存储，后继任务可用路径导航取值
        let mut plan = PlanBuilder::new("nested")
            .task("fetch", "produce json").tool("echo")
            .arg("text", Value::String(r#"{"user": {"name": "ada"}}"#.into()))
            .task("greet", "greet user").tool("echo")
            .arg("text", Value::String("hello ${fetch.user.name}".into()))
            .depends_on("greet", &["fetch"])
            .strategy(ExecutionStrategy::Mixed)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller));
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert_eq!(
            report.results.get("greet").unwrap(),
            &Value::String("hello ada".into())
        );
    }

    #[tokio::test]
    async fn test_hooks_fire_per_task() {
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::new();
        registry.register(crate::tools::EchoTool);
        registry.register(AlwaysFailTool);

        let mut plan = PlanBuilder::new("observed")
            .task("ok", "works").tool("echo").arg("text", Value::String("x".into()))
            .task("bad", "fails").tool("always_fail")
            .strategy(ExecutionStrategy::Parallel)
            .build()
            .unwrap();

        let s = started.clone();
        let c = completed.clone();
        let f = failed.clone();
        let hooks = ExecutorHooks {
            on_progress: Some(Arc::new(move |_t| {
                s.fetch_add(1, Ordering::SeqCst);
            })),
            on_task_complete: Some(Arc::new(move |_t| {
                c.fetch_add(1, Ordering::SeqCst);
            })),
            on_task_failed: Some(Arc::new(move |_t, _e| {
                f.fetch_add(1, Ordering::SeqCst);
            })),
        };

        let executor = PlanExecutor::new(tool_executor(registry), Arc::new(MockModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 0,
                ..Default::default()
            })
            .with_hooks(hooks);
        executor.execute_plan(&mut plan).await;

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_skips_remaining() {
        let token = CancellationToken::new();
        token.cancel();

        let mut plan = PlanBuilder::new("cancelled")
            .task("t", "never starts").tool("echo")
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();

        let executor = PlanExecutor::new(echo_executor(), Arc::new(MockModelCaller))
            .with_cancel_token(token);
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success); // 无失败任务，但计划未做任何事
        assert_eq!(plan.task("t").unwrap().status, TaskStatus::Skipped);
    }

    #[test]
    fn test_resolve_placeholder_keeps_json_type() {
        let mut results = HashMap::new();
        results.insert("a".to_string(), serde_json::json!({"n": 42}));

        let mut args = HashMap::new();
        args.insert("whole".to_string(), Value::String("${a}".into()));
        args.insert("path".to_string(), Value::String("${a.n}".into()));
        args.insert("inline".to_string(), Value::String("got ${a.n}!".into()));
        args.insert("missing".to_string(), Value::String("${ghost}".into()));

        let resolved = resolve_args(&args, &results);
        assert_eq!(resolved.get("whole").unwrap(), &serde_json::json!({"n": 42}));
        assert_eq!(resolved.get("path").unwrap(), &serde_json::json!(42));
        assert_eq!(resolved.get("inline").unwrap(), &Value::String("got 42!".into()));
        // 未知任务引用保留原文
        assert_eq!(resolved.get("missing").unwrap(), &Value::String("${ghost}".into()));
    }
}

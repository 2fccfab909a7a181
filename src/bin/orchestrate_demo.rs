//! Hive 演示程序 - 用 Mock 后端走通 计划 -> 执行 -> 反思 与递归处理两条路径

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use hive::{
    config::load_config,
    core::PlanBuilder,
    executor::{ExecutorHooks, PlanExecutor},
    llm::create_caller_from_config,
    reflect::Reflector,
    rlm::{RlmExecutor, RlmStrategy},
    tools::{EchoTool, ToolExecutor, ToolRegistry},
    ExecutionStrategy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    println!("🚀 Starting Hive orchestration demo");

    let cfg = load_config(None).unwrap_or_default();
    let model = create_caller_from_config(&cfg);

    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let tools = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));

    // 计划 -> 执行
    let mut plan = PlanBuilder::new("gather two snippets and merge them")
        .task("left", "produce left part")
        .tool("echo")
        .arg("text", Value::String("hello".into()))
        .task("right", "produce right part")
        .tool("echo")
        .arg("text", Value::String("world".into()))
        .task("merge", "merge both parts")
        .tool("echo")
        .arg("text", Value::String("${left} ${right}".into()))
        .depends_on("merge", &["left", "right"])
        .strategy(ExecutionStrategy::Mixed)
        .build()?;

    let hooks = ExecutorHooks {
        on_progress: Some(Arc::new(|task| {
            println!("  ▶ started: {}", task.id);
        })),
        on_task_complete: Some(Arc::new(|task| {
            println!("  ✓ completed: {}", task.id);
        })),
        on_task_failed: Some(Arc::new(|task, error| {
            println!("  ✗ failed: {} ({})", task.id, error);
        })),
    };

    let executor = PlanExecutor::new(tools, model.clone())
        .with_config(cfg.executor_config())
        .with_hooks(hooks);
    let report = executor.execute_plan(&mut plan).await;

    println!(
        "\n📋 Plan {}: {}/{} tasks completed",
        if report.success { "succeeded" } else { "failed" },
        plan.completed_tasks,
        plan.total_tasks
    );
    if let Some(merged) = report.results.get("merge") {
        println!("  merge result: {}", merged);
    }

    // 失败任务反思
    let reflector = Reflector::new(model.clone());
    for failed in plan.failed_tasks() {
        let reflection = reflector.analyze_result(failed, None).await;
        println!(
            "  reflection on {}: retry={} issues={:?}",
            failed.id, reflection.should_retry, reflection.issues
        );
    }

    // 递归处理：map-reduce 一段超过阈值的文本
    let mut variables = HashMap::new();
    variables.insert(
        "transcript".to_string(),
        Value::String("line one. line two. line three. ".repeat(200)),
    );

    let rlm = RlmExecutor::new(model).with_config(cfg.rlm_config());
    let outcome = rlm
        .execute("summarize the transcript", variables, RlmStrategy::MapReduce)
        .await;

    println!(
        "\n🔁 RLM run: success={} calls={} max_depth={} in {} ms",
        outcome.success,
        outcome.trajectory.total_calls,
        outcome.trajectory.max_depth,
        outcome.execution_time_ms
    );
    if let Some(result) = &outcome.result {
        println!("  result: {}", result);
    }
    if let Some(error) = &outcome.error {
        println!("  error: {}", error);
    }

    println!("\n✅ Demo completed");
    Ok(())
}

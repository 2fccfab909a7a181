//! 编排集成测试：规划 -> 拓扑排序 -> 执行 -> 反思 全链路

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::Value;

    use hive::executor::{ExecutorConfig, PlanExecutor};
    use hive::llm::{ScriptedModelCaller, UnreachableModelCaller};
    use hive::planner::{PlanContext, Planner};
    use hive::reflect::Reflector;
    use hive::rlm::{RlmConfig, RlmExecutor, RlmStrategy};
    use hive::tools::{EchoTool, ToolExecutor, ToolRegistry};
    use hive::{ExecutionStrategy, TaskStatus};

    fn echo_tools() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(ToolExecutor::new(registry, 5))
    }

    #[tokio::test]
    async fn test_plan_optimize_execute_roundtrip() {
        // 规划：模型返回乱序任务（依赖在后），拓扑排序应纠正顺序
        let model = Arc::new(ScriptedModelCaller::new());
        model.push_ok(
            r#"{"tasks": [
                {"id": "merge", "description": "merge parts",
                 "tool": "echo", "args": {"text": "${left} + ${right}"},
                 "dependencies": ["left", "right"]},
                {"id": "left", "description": "left part",
                 "tool": "echo", "args": {"text": "L"}},
                {"id": "right", "description": "right part",
                 "tool": "echo", "args": {"text": "R"}},
                {"id": "report", "description": "report the merge",
                 "tool": "echo", "args": {"text": "report: ${merge}"},
                 "dependencies": ["merge"]}
            ], "reasoning": "fan out then join"}"#,
        );

        let context = PlanContext {
            available_tools: vec![("echo".to_string(), "Echo text".to_string())],
            ..Default::default()
        };
        let planner = Planner::new(model.clone());
        let mut plan = planner.plan("merge two parts", &context).await;
        assert_eq!(plan.tasks.len(), 4);
        assert!(matches!(plan.strategy, ExecutionStrategy::Mixed));

        planner.optimize_plan(&mut plan).expect("no cycle");
        let pos = |id: &str| plan.tasks.iter().position(|t| t.id == id).unwrap();
        assert!(pos("left") < pos("merge"));
        assert!(pos("right") < pos("merge"));
        assert!(pos("merge") < pos("report"));

        // 执行：占位符沿依赖链解析
        let executor = PlanExecutor::new(echo_tools(), model).with_config(ExecutorConfig {
            concurrency_limit: 2,
            ..Default::default()
        });
        let report = executor.execute_plan(&mut plan).await;

        assert!(report.success);
        assert_eq!(plan.completed_tasks, 4);
        assert_eq!(
            report.results.get("report").unwrap(),
            &Value::String("report: L + R".into())
        );
    }

    #[tokio::test]
    async fn test_failure_path_reflection_and_replan() {
        // 规划兜底：后端给不出 JSON
        let planner = Planner::new(Arc::new(UnreachableModelCaller));
        let mut plan = planner.plan("do the impossible", &PlanContext::default()).await;
        assert_eq!(plan.tasks.len(), 1);

        // 执行：任务无工具、后端不可达 -> 失败
        let executor = PlanExecutor::new(echo_tools(), Arc::new(UnreachableModelCaller))
            .with_config(ExecutorConfig {
                max_retries: 1,
                ..Default::default()
            });
        let report = executor.execute_plan(&mut plan).await;
        assert!(!report.success);
        assert_eq!(report.failed_tasks.len(), 1);
        assert_eq!(plan.tasks[0].status, TaskStatus::Failed);

        // 反思走确定性兜底并建议重试
        let reflector = Reflector::new(Arc::new(UnreachableModelCaller));
        let reflection = reflector.analyze_result(&plan.tasks[0], None).await;
        assert!(!reflection.success);
        assert!(reflection.should_retry);

        // 重规划解析失败 -> 空列表表示无替代方案
        let replacement = planner
            .replan(&plan, &plan.tasks[0], "backend unreachable")
            .await;
        assert!(replacement.is_empty());
    }

    #[tokio::test]
    async fn test_rlm_map_reduce_end_to_end() {
        let model = Arc::new(ScriptedModelCaller::new());
        // 3 个分块 + 1 次归并
        model.push_ok("summary of part 1");
        model.push_ok("summary of part 2");
        model.push_ok("summary of part 3");
        model.push_ok("overall summary");

        let config = RlmConfig {
            min_chunk_threshold: 10,
            chunk_size: 10,
            ..Default::default()
        };
        let rlm = RlmExecutor::new(model).with_config(config);

        let mut variables = HashMap::new();
        variables.insert(
            "doc".to_string(),
            Value::String("abcdefghijklmnopqrstuvwxyz1234".into()),
        );

        let outcome = rlm
            .execute("summarize", variables, RlmStrategy::MapReduce)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("overall summary"));
        assert_eq!(outcome.trajectory.total_calls, 5);
        assert!(outcome.trajectory.calls.iter().all(|c| c.depth <= 1));
    }
}

//! Mock 模型调用器（用于测试，无需 API）
//!
//! MockModelCaller 回显固定确认文本；ScriptedModelCaller 按脚本顺序出队响应，
//! 便于在测试中精确控制规划 / 反思 / 递归处理各环节看到的模型输出。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::ModelCaller;

/// Mock 调用器：回显 prompt 前缀
#[derive(Debug, Default)]
pub struct MockModelCaller;

#[async_trait]
impl ModelCaller for MockModelCaller {
    async fn call(&self, prompt: &str, _model_hint: Option<&str>) -> Result<String, String> {
        let head: String = prompt.chars().take(80).collect();
        Ok(format!("Mock response for: {}", head))
    }
}

/// 脚本式调用器：按入队顺序返回预置响应，耗尽后返回错误
///
/// `calls()` 返回累计调用次数，`prompts()` 返回收到的 prompt 副本，
/// 供调用计数与 prompt 内容断言使用。
#[derive(Debug, Default)]
pub struct ScriptedModelCaller {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU64,
}

impl ScriptedModelCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Ok(response.into()));
    }

    pub fn push_err(&self, error: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Err(error.into()));
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl ModelCaller for ScriptedModelCaller {
    async fn call(&self, prompt: &str, _model_hint: Option<&str>) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("mock lock poisoned")
            .push(prompt.to_string());
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err("scripted responses exhausted".to_string()))
    }
}

/// 始终失败的调用器，模拟不可达后端
#[derive(Debug, Default)]
pub struct UnreachableModelCaller;

#[async_trait]
impl ModelCaller for UnreachableModelCaller {
    async fn call(&self, _prompt: &str, _model_hint: Option<&str>) -> Result<String, String> {
        Err("backend unreachable".to_string())
    }
}

//! 按 model_hint 分发的后端路由器
//!
//! 周边系统存在多个可互换后端；路由器按 hint 前缀匹配命名后端，
//! 未命中时走默认后端。后端之间不做失败自动切换，错误原样上抛。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::ModelCaller;

/// 命名后端集合：hint 以名称为前缀（如 "deepseek-chat" 命中 "deepseek"）时选中该后端
pub struct BackendRouter {
    backends: Vec<(String, Arc<dyn ModelCaller>)>,
    default_index: usize,
}

impl BackendRouter {
    /// 以默认后端创建路由器
    pub fn new(default_name: impl Into<String>, default_backend: Arc<dyn ModelCaller>) -> Self {
        Self {
            backends: vec![(default_name.into(), default_backend)],
            default_index: 0,
        }
    }

    /// 注册后端
    pub fn add_backend(mut self, name: impl Into<String>, backend: Arc<dyn ModelCaller>) -> Self {
        self.backends.push((name.into(), backend));
        self
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    fn resolve(&self, model_hint: Option<&str>) -> &Arc<dyn ModelCaller> {
        if let Some(hint) = model_hint {
            for (name, backend) in &self.backends {
                if hint == name || hint.starts_with(name.as_str()) {
                    return backend;
                }
            }
        }
        &self.backends[self.default_index].1
    }
}

#[async_trait]
impl ModelCaller for BackendRouter {
    async fn call(&self, prompt: &str, model_hint: Option<&str>) -> Result<String, String> {
        self.resolve(model_hint).call(prompt, model_hint).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        // 聚合所有后端的 token 使用
        self.backends
            .iter()
            .map(|(_, backend)| backend.token_usage())
            .fold((0, 0, 0), |acc, (a, b, c)| (acc.0 + a, acc.1 + b, acc.2 + c))
    }
}

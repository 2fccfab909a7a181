//! 模型调用抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock / 路由器）实现 ModelCaller：
//! 给定单条 prompt 返回文本或错误，无状态、可安全共享。

use async_trait::async_trait;

/// 模型调用 trait：单 prompt 进、文本出
///
/// `model_hint` 为调用方建议的模型名；后端可据此选择具体模型，
/// 不识别时使用各自默认值。失败以 Err(String) 上抛，由发起调用的组件决定降级策略。
#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn call(&self, prompt: &str, model_hint: Option<&str>) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

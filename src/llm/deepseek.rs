//! DeepSeek 调用器（OpenAI 兼容端点）
//!
//! DeepSeek 暴露与 OpenAI 完全兼容的 chat API，直接复用 OpenAiCaller，
//! 仅固定 base_url 并按 DeepSeek 的模型命名解析默认模型。

use crate::llm::OpenAiCaller;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
/// 常规对话模型
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
/// 思考模式模型，适合复杂推理
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 创建 DeepSeek 调用器
///
/// API Key 取 `DEEPSEEK_API_KEY`，缺省时回退 `OPENAI_API_KEY`（同为兼容端点）。
/// 模型优先级：显式参数 > `DEEPSEEK_MODEL` 环境变量 > deepseek-chat。
pub fn create_deepseek_caller(model: Option<&str>) -> OpenAiCaller {
    let api_key = ["DEEPSEEK_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = match model {
        Some(m) => m.to_string(),
        None => std::env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| DEEPSEEK_CHAT.to_string()),
    };

    OpenAiCaller::new(Some(DEEPSEEK_BASE_URL), &model, Some(&api_key))
}

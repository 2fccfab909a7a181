//! 模型调用层：ModelCaller 抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 路由器）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod router;
pub mod traits;

pub use deepseek::{create_deepseek_caller, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::{MockModelCaller, ScriptedModelCaller, UnreachableModelCaller};
pub use openai::{OpenAiCaller, TokenUsage};
pub use router::BackendRouter;
pub use traits::ModelCaller;

use std::sync::Arc;

use crate::config::AppConfig;

/// 按配置与可用 API Key 创建模型调用器
///
/// 有 DeepSeek Key（或配置为 deepseek 且仅有 OpenAI Key）走 DeepSeek 兼容端点；
/// 否则有 OpenAI Key 走 OpenAI 兼容端点；都没有时退回 Mock，便于离线运行。
pub fn create_caller_from_config(cfg: &AppConfig) -> Arc<dyn ModelCaller> {
    let provider = cfg.llm.provider.to_lowercase();
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek backend ({})", model);
        Arc::new(create_deepseek_caller(Some(&model)))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI backend ({})", model);
        Arc::new(OpenAiCaller::new(
            base,
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock backend");
        Arc::new(MockModelCaller)
    }
}

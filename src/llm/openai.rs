//! OpenAI 兼容 API 调用器
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! model_hint 存在时覆盖默认模型，便于同一端点上按调用选择模型。

use std::sync::atomic::{AtomicU64, Ordering};

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::ModelCaller;

/// Token 使用统计（累计值，并发调用间共享）
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl TokenUsage {
    fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// 返回 (prompt_tokens, completion_tokens, total_tokens)
    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容调用器：持有 Client 与默认 model 名，call 时取首条 choice 的 content
pub struct OpenAiCaller {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiCaller {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let key = api_key
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let mut config = OpenAIConfig::new().with_api_key(key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::default(),
        }
    }
}

#[async_trait]
impl ModelCaller for OpenAiCaller {
    async fn call(&self, prompt: &str, model_hint: Option<&str>) -> Result<String, String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| e.to_string())?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_hint.unwrap_or(&self.model))
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| "empty completion response".to_string())
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}

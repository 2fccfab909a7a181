//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，
//! 如 `HIVE__EXECUTOR__CONCURRENCY_LIMIT=8`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::executor::ExecutorConfig;
use crate::rlm::RlmConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub executor: ExecutorSection,
    pub rlm: RlmSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [executor] 段：并发上限、重试预算与退避
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// 同时在途任务上限
    pub concurrency_limit: usize,
    /// 单任务重试预算
    pub max_retries: u32,
    /// 重试退避基数（毫秒）；0 保持立即重试
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_retries: 2,
            retry_backoff_ms: 0,
        }
    }
}

/// [rlm] 段：递归深度、墙钟时限与分块参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RlmSection {
    pub max_recursion_depth: usize,
    pub max_execution_ms: u64,
    /// 低于此序列化长度（字符）的上下文直接单次调用
    pub min_chunk_threshold: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// prompt 中单变量序列化形式的截断上限
    pub variable_truncate_chars: usize,
}

impl Default for RlmSection {
    fn default() -> Self {
        Self {
            max_recursion_depth: 3,
            max_execution_ms: 120_000,
            min_chunk_threshold: 2_000,
            chunk_size: 4_000,
            chunk_overlap: 0,
            variable_truncate_chars: 4_000,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [tools] 段：单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// 计划执行器配置
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            concurrency_limit: self.executor.concurrency_limit,
            max_retries: self.executor.max_retries,
            retry_backoff_ms: self.executor.retry_backoff_ms,
        }
    }

    /// 递归处理配置；并发上限沿用执行器的上限
    pub fn rlm_config(&self) -> RlmConfig {
        RlmConfig {
            max_recursion_depth: self.rlm.max_recursion_depth,
            max_execution_ms: self.rlm.max_execution_ms,
            min_chunk_threshold: self.rlm.min_chunk_threshold,
            chunk_size: self.rlm.chunk_size,
            chunk_overlap: self.rlm.chunk_overlap,
            variable_truncate_chars: self.rlm.variable_truncate_chars,
            concurrency_limit: self.executor.concurrency_limit,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（配置热更新：调用方决定是否用新配置重建组件）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

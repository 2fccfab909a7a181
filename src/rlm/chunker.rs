//! 分块器
//!
//! 把超出单次模型调用承载量的字符串 / 列表切为有序小块：
//! 定长（支持重叠）、语义（句子边界）、结构（分隔符）、自定义函数。
//! 无状态配置，按字符计数切分避免落在 UTF-8 边界内。

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// 分块策略
#[derive(Clone)]
pub enum ChunkStrategy {
    /// 定长分块；overlap 为相邻块重叠字符数
    FixedSize { size: usize, overlap: usize },
    /// 按句子边界聚合，单块不超过 max_chars
    Semantic { max_chars: usize },
    /// 按分隔符切分，空段丢弃
    Structural { separator: String },
    /// 调用方提供的切分函数
    Custom(Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>),
}

impl fmt::Debug for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedSize { size, overlap } => f
                .debug_struct("FixedSize")
                .field("size", size)
                .field("overlap", overlap)
                .finish(),
            Self::Semantic { max_chars } => f
                .debug_struct("Semantic")
                .field("max_chars", max_chars)
                .finish(),
            Self::Structural { separator } => f
                .debug_struct("Structural")
                .field("separator", separator)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// 把文本按策略切为有序块；空输入返回空列表
pub fn chunk_text(text: &str, strategy: &ChunkStrategy) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    match strategy {
        ChunkStrategy::FixedSize { size, overlap } => chunk_fixed(text, *size, *overlap),
        ChunkStrategy::Semantic { max_chars } => chunk_semantic(text, *max_chars),
        ChunkStrategy::Structural { separator } => text
            .split(separator.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        ChunkStrategy::Custom(f) => f(text),
    }
}

/// 把 JSON 值切块：数组按条目聚组（组序列化长度受 size_hint 约束），
/// 字符串走文本分块，其余类型序列化后走文本分块
pub fn chunk_value(value: &Value, strategy: &ChunkStrategy, size_hint: usize) -> Vec<Value> {
    match value {
        Value::Array(items) => chunk_array(items, size_hint),
        Value::String(s) => chunk_text(s, strategy)
            .into_iter()
            .map(Value::String)
            .collect(),
        other => chunk_text(&other.to_string(), strategy)
            .into_iter()
            .map(Value::String)
            .collect(),
    }
}

/// 数组聚组：连续条目打包，单组序列化长度不超过 size_hint（每组至少一条）
fn chunk_array(items: &[Value], size_hint: usize) -> Vec<Value> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut current_len = 0usize;

    for item in items {
        let item_len = item.to_string().len();
        if !current.is_empty() && current_len + item_len > size_hint {
            groups.push(Value::Array(std::mem::take(&mut current)));
            current_len = 0;
        }
        current_len += item_len;
        current.push(item.clone());
    }
    if !current.is_empty() {
        groups.push(Value::Array(current));
    }
    groups
}

fn chunk_fixed(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let step = size - overlap;
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// 句子边界：中英文句号、问叹号、换行
fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '\n')
}

fn chunk_semantic(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);

    // 先切句
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if is_sentence_end(c) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    // 再按 max_chars 聚合；超长单句独立成块
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    for sentence in sentences {
        let candidate_len = buffer.chars().count() + sentence.chars().count() + 1;
        if !buffer.is_empty() && candidate_len > max_chars {
            chunks.push(std::mem::take(&mut buffer));
        }
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&sentence);
    }
    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    chunks
}

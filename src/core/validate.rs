//! 不可信模型输出的解析与校验
//!
//! LLM 返回的文本可能混有说明性散文、Markdown 代码块或残缺 JSON。
//! 统一流程：先提取 JSON 块（```json 围栏或首个配平的 {...} / [...]），
//! 再反序列化为强类型结构，结果以 Validated 标签返回，调用方据此走兜底路径而非崩溃。

use serde::de::DeserializeOwned;

/// 校验结果：要么是通过强类型反序列化的值，要么携带失败原因
#[derive(Debug)]
pub enum Validated<T> {
    Valid(T),
    Invalid(String),
}

impl<T> Validated<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Validated::Valid(v) => Some(v),
            Validated::Invalid(_) => None,
        }
    }
}

/// 从文本中提取首个配平的 JSON 对象块，容忍前后散文
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_fenced(text).or_else(|| extract_balanced(text, '{', '}'))
}

/// 从文本中提取首个配平的 JSON 数组块
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_fenced(text)
        .filter(|s| s.trim_start().starts_with('['))
        .or_else(|| extract_balanced(text, '[', ']'))
}

/// 提取 ```json ... ``` 围栏内容
fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find("```json")?;
    let rest = &text[start + 7..];
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(inner.trim())
}

/// 深度计数法提取配平块；跳过字符串内部的括号与转义字符
fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 提取 JSON 对象并反序列化为 T；任何环节失败都返回 Invalid 而非 Err
pub fn parse_llm_object<T: DeserializeOwned>(text: &str) -> Validated<T> {
    let Some(block) = extract_json_object(text) else {
        return Validated::Invalid("no JSON object found in response".to_string());
    };
    match serde_json::from_str(block) {
        Ok(v) => Validated::Valid(v),
        Err(e) => Validated::Invalid(format!("{}: {}", e, preview(block))),
    }
}

/// 提取 JSON 数组并反序列化为 Vec<T>
pub fn parse_llm_array<T: DeserializeOwned>(text: &str) -> Validated<Vec<T>> {
    let Some(block) = extract_json_array(text) else {
        return Validated::Invalid("no JSON array found in response".to_string());
    };
    match serde_json::from_str(block) {
        Ok(v) => Validated::Valid(v),
        Err(e) => Validated::Invalid(format!("{}: {}", e, preview(block))),
    }
}

fn preview(s: &str) -> String {
    if s.len() > 120 {
        format!("{}...", s.chars().take(120).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        value: i32,
    }

    #[test]
    fn test_extract_plain_object() {
        let text = r#"Here is the result: {"value": 3} hope it helps"#;
        assert_eq!(extract_json_object(text), Some(r#"{"value": 3}"#));
    }

    #[test]
    fn test_extract_fenced_object() {
        let text = "```json\n{\"value\": 5}\n```";
        let parsed: Validated<Probe> = parse_llm_object(text);
        assert_eq!(parsed.ok().unwrap().value, 5);
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"value": 1, "note": "a } inside"}"#;
        let parsed: Validated<serde_json::Value> = parse_llm_object(text);
        assert!(parsed.ok().is_some());
    }

    #[test]
    fn test_no_json_is_invalid() {
        let parsed: Validated<Probe> = parse_llm_object("I cannot produce JSON");
        assert!(matches!(parsed, Validated::Invalid(_)));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let parsed: Validated<Probe> = parse_llm_object(r#"{"value": "not a number"}"#);
        assert!(matches!(parsed, Validated::Invalid(_)));
    }

    #[test]
    fn test_extract_array() {
        let text = r#"Sure: [{"value": 1}, {"value": 2}] done"#;
        let parsed: Validated<Vec<Probe>> = parse_llm_array(text);
        assert_eq!(parsed.ok().unwrap().len(), 2);
    }
}

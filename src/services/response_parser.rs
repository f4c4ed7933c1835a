//! 响应解析服务 - 业务能力层
//!
//! 模型的补全文本并不可靠：可能带 markdown 代码块标记、前后夹杂说明文字、
//! 单个对象 / 数组 / 多个对象直接拼接。这里先剥掉代码块标记，再扫描
//! 配平的大括号/中括号片段，逐段独立解析；某一段解析失败只记录失败，
//! 不影响其余片段。

use crate::models::question::QuestionCandidate;
use serde_json::Value;

/// 单个片段的解析失败记录
#[derive(Debug, Clone)]
pub struct ParseFailure {
    /// 出错片段的截断预览
    pub snippet: String,
    pub reason: String,
}

/// 从模型补全文本中提取候选题目
///
/// 返回解析出的候选和逐片段的失败记录，两者可以同时非空
pub fn parse_completion(raw: &str) -> (Vec<QuestionCandidate>, Vec<ParseFailure>) {
    let cleaned = strip_markdown_fences(raw);
    let mut candidates = Vec::new();
    let mut failures = Vec::new();

    for span in scan_json_spans(&cleaned) {
        match serde_json::from_str::<Value>(span) {
            Ok(value) => collect_candidates(value, &mut candidates, &mut failures),
            Err(e) => failures.push(ParseFailure {
                snippet: preview(span),
                reason: format!("JSON解析失败: {}", e),
            }),
        }
    }

    (candidates, failures)
}

// 移除 ```json / ``` 代码块标记
fn strip_markdown_fences(raw: &str) -> String {
    let mut content = raw.trim();

    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }

    // 正文中间残留的代码块标记按行剔除
    if content.contains("```") {
        content
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.starts_with("```") && trimmed != "json"
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        content.to_string()
    }
}

/// 扫描顶层配平的 `{…}` / `[…]` 片段
///
/// 字符串字面量内的括号和转义引号不参与配平；
/// 文本末尾未配平的片段也返回，交给解析阶段报错
fn scan_json_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' | '[' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' | ']' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            spans.push(&text[s..idx + c.len_utf8()]);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // 未闭合的片段（模型输出被截断时常见）
    if let Some(s) = start {
        spans.push(&text[s..]);
    }

    spans
}

// 把一个解析成功的 JSON 值展开成候选题目
fn collect_candidates(
    value: Value,
    candidates: &mut Vec<QuestionCandidate>,
    failures: &mut Vec<ParseFailure>,
) {
    match value {
        Value::Object(mut map) => {
            if let Some(questions) = map.remove("questions") {
                match questions {
                    Value::Array(items) => {
                        for item in items {
                            push_candidate(item, candidates, failures);
                        }
                    }
                    other => failures.push(ParseFailure {
                        snippet: preview(&other.to_string()),
                        reason: "questions 字段不是数组".to_string(),
                    }),
                }
            } else {
                push_candidate(Value::Object(map), candidates, failures);
            }
        }
        Value::Array(items) => {
            for item in items {
                push_candidate(item, candidates, failures);
            }
        }
        other => failures.push(ParseFailure {
            snippet: preview(&other.to_string()),
            reason: "片段不是对象或数组".to_string(),
        }),
    }
}

fn push_candidate(
    value: Value,
    candidates: &mut Vec<QuestionCandidate>,
    failures: &mut Vec<ParseFailure>,
) {
    let snippet = preview(&value.to_string());
    match serde_json::from_value::<QuestionCandidate>(value) {
        Ok(candidate) => candidates.push(candidate),
        Err(e) => failures.push(ParseFailure {
            snippet,
            reason: format!("题目反序列化失败: {}", e),
        }),
    }
}

fn preview(text: &str) -> String {
    crate::utils::logging::truncate_text(text, 80)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let raw = r#"{"content": "某题干", "correctAnswer": ["A"]}"#;
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 1);
        assert!(failures.is_empty());
        assert_eq!(candidates[0].content, "某题干");
    }

    #[test]
    fn test_parse_questions_wrapper() {
        let raw = r#"{"questions": [{"content": "题一"}, {"content": "题二"}]}"#;
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 2);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_parse_bare_array() {
        let raw = r#"[{"content": "题一"}, {"content": "题二"}]"#;
        let (candidates, _) = parse_completion(raw);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_parse_with_markdown_fences() {
        let raw = "```json\n{\"questions\": [{\"content\": \"题一\"}]}\n```";
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 1);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let raw = "好的，以下是提取结果：\n{\"content\": \"题一\"}\n希望对你有帮助。";
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 1);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_parse_concatenated_objects() {
        let raw = r#"{"content": "题一"} {"content": "题二"}"#;
        let (candidates, _) = parse_completion(raw);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_partial_parse_tolerance() {
        // 一个完整对象 + 一段截断的 JSON：前者成功，后者只记失败
        let raw = "{\"content\": \"完整题目\"}\n{\"content\": \"被截断的";
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "完整题目");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("JSON解析失败"));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let raw = r#"{"content": "含有 { 和 } 的题干"}"#;
        let (candidates, failures) = parse_completion(raw);
        assert_eq!(candidates.len(), 1);
        assert!(failures.is_empty());
        assert_eq!(candidates[0].content, "含有 { 和 } 的题干");
    }

    #[test]
    fn test_prose_only_yields_nothing() {
        let (candidates, failures) = parse_completion("未找到任何题目。");
        assert!(candidates.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn test_questions_not_array_reported() {
        let raw = r#"{"questions": "不是数组"}"#;
        let (candidates, failures) = parse_completion(raw);
        assert!(candidates.is_empty());
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("不是数组"));
    }
}

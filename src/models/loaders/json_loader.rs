//! 从中间 JSON 文件加载源文本并切成文本块
//!
//! 外部 PDF 转换工具的输出是 `[{type, text, text_level, page_idx}, …]`
//! 形式的 JSON 文件；也接受直接提供的同格式文件。
//! 实际遇到的文件经常带有各种格式毛病（键名没有引号、行尾省略号、
//! 整行拼接的对象），这里做尽力而为的修复后再解析。

use crate::models::chunk::TextChunk;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 中间 JSON 中的一条文本段
#[derive(Debug, Clone, Deserialize)]
pub struct RawTextSegment {
    #[serde(rename = "type", default)]
    pub segment_type: String,
    pub text: String,
    #[serde(default)]
    pub text_level: Option<i64>,
    #[serde(default)]
    pub page_idx: Option<i64>,
}

/// 解析中间 JSON 内容为文本段列表
///
/// 依次尝试：直接解析 → 修复常见格式问题后解析 → 逐行恢复
pub fn parse_segments(content: &str) -> Result<Vec<RawTextSegment>> {
    let content = content.trim();

    let value = match serde_json::from_str::<Value>(content) {
        Ok(v) => v,
        Err(first_err) => match repair_json(content) {
            Some(v) => v,
            None => {
                let recovered = parse_lines(content);
                if recovered.is_empty() {
                    return Err(first_err).context("JSON 内容无法解析且无法修复");
                }
                Value::Array(recovered)
            }
        },
    };

    Ok(normalize_segments(value))
}

// 修复 JavaScript 对象写法（键名无引号）和行尾省略号
fn repair_json(content: &str) -> Option<Value> {
    let key_re = Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).ok()?;
    let fixed = key_re.replace_all(content, r#"$1"$2":"#);
    let ellipsis_re = Regex::new(r"…\s*\}").ok()?;
    let fixed = ellipsis_re.replace_all(&fixed, "}");
    serde_json::from_str(&fixed).ok()
}

// 逐行恢复：只保留能独立解析成对象的行
fn parse_lines(content: &str) -> Vec<Value> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_end_matches(',');
            if line.starts_with('{') {
                serde_json::from_str::<Value>(line).ok()
            } else {
                None
            }
        })
        .collect()
}

// 统一成 RawTextSegment 列表：字符串元素提升为纯文本段
fn normalize_segments(value: Value) -> Vec<RawTextSegment> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(RawTextSegment {
                    segment_type: "text".to_string(),
                    text,
                    text_level: None,
                    page_idx: None,
                }),
                Value::Object(_) => serde_json::from_value(item).ok(),
                _ => None,
            })
            .collect(),
        other => vec![RawTextSegment {
            segment_type: "text".to_string(),
            text: other.to_string(),
            text_level: None,
            page_idx: None,
        }],
    }
}

/// 将文本段按每块最多 `max_segments` 条分组为文本块
///
/// 块内文本以 "序号. 内容" 逐行编号，空白段被跳过
pub fn segments_to_chunks(
    source_id: &str,
    segments: &[RawTextSegment],
    max_segments: usize,
) -> Vec<TextChunk> {
    let texts: Vec<&str> = segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let max_segments = max_segments.max(1);
    texts
        .chunks(max_segments)
        .enumerate()
        .map(|(seq, group)| {
            let formatted = group
                .iter()
                .enumerate()
                .map(|(idx, text)| format!("{}. {}", idx + 1, text))
                .collect::<Vec<_>>()
                .join("\n");
            TextChunk::new(source_id, seq, formatted)
        })
        .collect()
}

/// 加载单个中间 JSON 文件并切块
pub async fn load_json_source(path: &Path, max_segments: usize) -> Result<Vec<TextChunk>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取JSON文件: {}", path.display()))?;

    let segments = parse_segments(&content)
        .with_context(|| format!("无法解析JSON文件: {}", path.display()))?;

    let source_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(segments_to_chunks(&source_id, &segments, max_segments))
}

/// 从文件夹加载所有中间 JSON 文件并汇成统一的块序列
///
/// 文件按名称排序后依次处理，保证多次运行产出相同的块顺序
pub async fn load_all_json_files(folder_path: &str, max_segments: usize) -> Result<Vec<TextChunk>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut json_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            json_files.push(path);
        }
    }
    json_files.sort();

    let mut all_chunks = Vec::new();
    for path in &json_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_json_source(path, max_segments).await {
            Ok(chunks) => {
                tracing::info!("成功切分为 {} 个文本块", chunks.len());
                all_chunks.extend(chunks);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(all_chunks)
}

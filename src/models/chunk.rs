//! 文本块与补全请求/结果模型
//!
//! 流水线的临时数据：TextChunk 由文本源适配器产出后不可变，
//! CompletionRequest / CompletionResult 只在一次流水线处理内存活。

use serde::Serialize;
use std::fmt;

/// 一段待提取的源文本
///
/// 同一 `source_id` 内按 `sequence_index` 排序
#[derive(Debug, Clone, Serialize)]
pub struct TextChunk {
    /// 来源标识（通常是输入文件名）
    pub source_id: String,
    /// 块在来源内的序号
    pub sequence_index: usize,
    /// 原始文本内容
    pub raw_text: String,
    /// 估算的 token 数量
    pub estimated_token_count: usize,
}

impl TextChunk {
    /// 创建新的文本块，自动估算 token 数量
    pub fn new(
        source_id: impl Into<String>,
        sequence_index: usize,
        raw_text: impl Into<String>,
    ) -> Self {
        let raw_text = raw_text.into();
        let estimated_token_count = estimate_tokens(&raw_text);
        Self {
            source_id: source_id.into(),
            sequence_index,
            raw_text,
            estimated_token_count,
        }
    }
}

/// 估算文本的 token 数量
///
/// ASCII 字符约 4 个合 1 token，CJK 等宽字符按每字 1 token 估算
pub fn estimate_tokens(text: &str) -> usize {
    let mut ascii = 0usize;
    let mut wide = 0usize;
    for c in text.chars() {
        if c.is_ascii() {
            ascii += 1;
        } else {
            wide += 1;
        }
    }
    (ascii + 3) / 4 + wide
}

/// 块的轻量引用，用于失败记录和候选题目的溯源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRef {
    pub source_id: String,
    pub sequence_index: usize,
    /// 切分后的子块序号（未切分时为 None）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<usize>,
}

impl ChunkRef {
    pub fn new(chunk: &TextChunk) -> Self {
        Self {
            source_id: chunk.source_id.clone(),
            sequence_index: chunk.sequence_index,
            sub_index: None,
        }
    }

    pub fn with_sub_index(chunk: &TextChunk, sub_index: usize) -> Self {
        Self {
            source_id: chunk.source_id.clone(),
            sequence_index: chunk.sequence_index,
            sub_index: Some(sub_index),
        }
    }
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_index {
            Some(sub) => write!(f, "{}#{}.{}", self.source_id, self.sequence_index, sub),
            None => write!(f, "{}#{}", self.source_id, self.sequence_index),
        }
    }
}

/// 一次补全请求
///
/// 超长块被切分时，每个子块各自构建一条请求，
/// 通过 `(sequence_index, sub_index)` 保持原始顺序
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// 请求对应的（子）块
    pub chunk: TextChunk,
    /// 子块序号（未切分时为 0）
    pub sub_index: usize,
    /// 完整提示词（指令 + 目标结构 + 文本）
    pub prompt_text: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// 请求对应块的引用
    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef::with_sub_index(&self.chunk, self.sub_index)
    }
}

/// 块级失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// 重试耗尽后后端仍不可用（超时 / 网络 / 频率限制）
    BackendUnavailable,
    /// 后端明确拒绝（认证失败、请求格式错误），不重试
    BackendRejected,
    /// 批次被取消，该块未开始处理
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::BackendUnavailable => write!(f, "后端不可用"),
            FailureKind::BackendRejected => write!(f, "后端拒绝请求"),
            FailureKind::Cancelled => write!(f, "已取消"),
        }
    }
}

/// 一次补全的结果：成功与失败互斥
#[derive(Debug, Clone)]
pub enum CompletionResult {
    /// 成功：模型返回的原始补全文本
    Success {
        chunk: TextChunk,
        sub_index: usize,
        raw_completion_text: String,
    },
    /// 失败：已归类的失败原因
    Failure {
        chunk: TextChunk,
        sub_index: usize,
        failure_kind: FailureKind,
        detail: String,
    },
}

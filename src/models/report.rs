//! 批处理报告模型

use crate::models::chunk::ChunkRef;
use crate::models::question::QuestionRecord;
use serde::Serialize;
use std::fmt;

/// 失败发生的流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// 补全请求阶段
    Request,
    /// 响应解析阶段
    Parse,
    /// 候选校验阶段
    Validate,
    /// 文档组装阶段（重复题目丢弃）
    Assemble,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Request => write!(f, "请求"),
            PipelineStage::Parse => write!(f, "解析"),
            PipelineStage::Validate => write!(f, "校验"),
            PipelineStage::Assemble => write!(f, "组装"),
        }
    }
}

/// 单条非致命失败记录
///
/// 携带块标识、阶段和原因，足以定位并重跑失败的块
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk: ChunkRef,
    pub stage: PipelineStage,
    pub reason: String,
}

impl ChunkFailure {
    pub fn new(chunk: ChunkRef, stage: PipelineStage, reason: impl Into<String>) -> Self {
        Self {
            chunk,
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}阶段: {}", self.chunk, self.stage, self.reason)
    }
}

/// 一次批处理的最终报告
///
/// records 按最终输出顺序排列，failures 按块顺序排列
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_chunks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: Vec<QuestionRecord>,
    pub failures: Vec<ChunkFailure>,
}

impl BatchReport {
    /// 没有产出任何记录的批次视为失败运行
    pub fn is_empty_run(&self) -> bool {
        self.records.is_empty()
    }
}

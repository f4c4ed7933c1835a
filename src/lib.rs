//! # PDF2Question
//!
//! 把 PDF 提取文本（中间 JSON）批量转换为标准化题库记录的结构化提取流水线
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 文本块、候选题目、最终记录、批次报告
//! - `models/loaders` - 文本源适配：中间 JSON → 统一的 TextChunk 序列
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个块或单个候选
//! - `PromptBuilder` - 提示词构建能力（含超长切分）
//! - `ExtractionClient` - 补全调用能力（超时、重试、失败归类）
//! - `parse_completion` - 自由文本 → 候选题目
//! - `Validator` - 候选校验能力（封闭的拒绝原因集合）
//! - `DocumentAssembler` - 盖戳组装与指纹去重
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/chunk_pipeline` - 单块完整流程
//! - `orchestrator/batch_runner` - 批次并发与确定性合并
//! - `orchestrator/batch_processor` - 应用生命周期与输入输出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    BatchReport, ChunkFailure, ChunkRef, CompletionRequest, CompletionResult, FailureKind,
    PipelineStage, QuestionCandidate, QuestionRecord, QuestionType, SchemaSpec, TextChunk,
};
pub use orchestrator::{App, BatchOrchestrator, BatchProgress, CancelHandle};
pub use services::{
    CompletionBackend, DocumentAssembler, ExtractionClient, PromptBuilder, SequentialIdGenerator,
    Validator,
};

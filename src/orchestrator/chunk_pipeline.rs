//! 单块流水线 - 流程层
//!
//! 定义"一个文本块"的完整处理流程：
//! 构建提示词 → 补全 → 解析 → 校验
//!
//! - 不持有任何批次状态，可安全克隆进并发任务
//! - 块内失败（解析/校验）逐条记录，不中断剩余工作
//! - 只有所有子请求都失败时整块才算失败

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::chunk::{ChunkRef, CompletionResult, FailureKind, TextChunk};
use crate::models::question::ValidatedCandidate;
use crate::models::report::{ChunkFailure, PipelineStage};
use crate::models::schema::SchemaSpec;
use crate::services::extraction_client::{CompletionBackend, ExtractionClient};
use crate::services::prompt_builder::PromptBuilder;
use crate::services::response_parser::parse_completion;
use crate::services::validator::Validator;
use crate::utils::logging::truncate_text;

/// 单个文本块的处理状态
///
/// `Failed` 对该块是终态，但不影响批次里的其他块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Requested,
    Parsed,
    Validated,
    Assembled,
    Failed(FailureKind),
}

/// 单块处理结果
#[derive(Debug)]
pub struct ChunkOutcome {
    /// 块在整个批次输入中的位置，合并时按它排序
    pub batch_index: usize,
    pub chunk: ChunkRef,
    pub state: ChunkState,
    /// 已校验候选，按子块顺序、子块内出现顺序排列
    pub candidates: Vec<(ChunkRef, ValidatedCandidate)>,
    pub failures: Vec<ChunkFailure>,
}

impl ChunkOutcome {
    /// 构造"未开始即被取消"的结果
    pub fn cancelled(batch_index: usize, chunk: &TextChunk) -> Self {
        let chunk_ref = ChunkRef::new(chunk);
        Self {
            batch_index,
            chunk: chunk_ref.clone(),
            state: ChunkState::Failed(FailureKind::Cancelled),
            candidates: Vec::new(),
            failures: vec![ChunkFailure::new(
                chunk_ref,
                PipelineStage::Request,
                "批次已取消，该块未开始处理",
            )],
        }
    }

    /// 构造任务崩溃时的兜底失败结果
    pub fn crashed(batch_index: usize, chunk_ref: ChunkRef, detail: String) -> Self {
        Self {
            batch_index,
            chunk: chunk_ref.clone(),
            state: ChunkState::Failed(FailureKind::BackendUnavailable),
            candidates: Vec::new(),
            failures: vec![ChunkFailure::new(chunk_ref, PipelineStage::Request, detail)],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ChunkState::Failed(_))
    }
}

/// 单块流水线
#[derive(Clone)]
pub struct ChunkPipeline {
    prompt_builder: PromptBuilder,
    client: Arc<ExtractionClient>,
    validator: Validator,
    schema: SchemaSpec,
    verbose_logging: bool,
}

impl ChunkPipeline {
    pub fn new(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        let schema = SchemaSpec::new(config.defaults.clone());
        Self {
            prompt_builder: PromptBuilder::new(config),
            client: Arc::new(ExtractionClient::new(backend, config)),
            validator: Validator::new(&schema),
            schema,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 共享的提取客户端（尝试/失败计数是全批次累计的）
    pub fn client(&self) -> &Arc<ExtractionClient> {
        &self.client
    }

    /// 处理一个文本块
    pub async fn run(&self, batch_index: usize, chunk: &TextChunk) -> ChunkOutcome {
        let chunk_ref = ChunkRef::new(chunk);
        let requests = self.prompt_builder.build(chunk, &self.schema);

        if requests.len() > 1 {
            info!(
                "✂️ [{}] 文本超出预算，切分为 {} 个子块",
                chunk_ref,
                requests.len()
            );
        }

        let mut state = ChunkState::Requested;
        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        let mut any_success = false;
        let mut first_failure_kind: Option<FailureKind> = None;

        for request in &requests {
            let sub_ref = request.chunk_ref();
            match self.client.execute(request).await {
                CompletionResult::Success {
                    raw_completion_text,
                    ..
                } => {
                    any_success = true;
                    state = ChunkState::Parsed;

                    let (parsed, parse_failures) = parse_completion(&raw_completion_text);
                    for failure in parse_failures {
                        failures.push(ChunkFailure::new(
                            sub_ref.clone(),
                            PipelineStage::Parse,
                            format!("{} (片段: {})", failure.reason, failure.snippet),
                        ));
                    }

                    let parsed_count = parsed.len();
                    let accepted_before = candidates.len();
                    for candidate in parsed {
                        let preview = truncate_text(candidate.content.trim(), 40);
                        match self.validator.validate(candidate) {
                            Ok(validated) => {
                                candidates.push((sub_ref.clone(), validated));
                            }
                            Err(reason) => {
                                if self.verbose_logging {
                                    debug!("🚫 [{}] 候选被拒绝: {}", sub_ref, reason);
                                }
                                failures.push(ChunkFailure::new(
                                    sub_ref.clone(),
                                    PipelineStage::Validate,
                                    format!("{} (题干: {})", reason, preview),
                                ));
                            }
                        }
                    }
                    state = ChunkState::Validated;

                    debug!(
                        "📊 [{}] 解析出 {} 个候选，{} 个通过校验",
                        sub_ref,
                        parsed_count,
                        candidates.len() - accepted_before
                    );
                }
                CompletionResult::Failure {
                    failure_kind,
                    detail,
                    ..
                } => {
                    first_failure_kind.get_or_insert(failure_kind);
                    failures.push(ChunkFailure::new(
                        sub_ref,
                        PipelineStage::Request,
                        format!("{}: {}", failure_kind, detail),
                    ));
                }
            }
        }

        if !any_success {
            let kind = first_failure_kind.unwrap_or(FailureKind::BackendUnavailable);
            warn!("❌ [{}] 所有子请求均失败: {}", chunk_ref, kind);
            state = ChunkState::Failed(kind);
        }

        ChunkOutcome {
            batch_index,
            chunk: chunk_ref,
            state,
            candidates,
            failures,
        }
    }
}

//! 批次编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **并发控制**：使用 Semaphore 限制同时在途的块数量，尊重后端频率限制
//! 2. **首块先行**：首块遭后端永久拒绝说明是系统性配置问题，直接终止批次
//! 3. **确定性合并**：不论完成顺序如何，合并前按原始块顺序排序，
//!    再交给单线程的文档组装器盖戳编号
//! 4. **进度与取消**：对外暴露单调递增的进度计数和取消句柄；
//!    已在途的请求允许跑完，未开始的块记为取消失败
//!
//! ## 设计特点
//!
//! - 各块之间没有共享可变状态，唯一共享资源是无状态的后端客户端
//! - 块级失败不中断批次，全部汇入最终报告

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::models::chunk::{ChunkRef, FailureKind, TextChunk};
use crate::models::report::BatchReport;
use crate::orchestrator::chunk_pipeline::{ChunkOutcome, ChunkPipeline, ChunkState};
use crate::services::assembler::DocumentAssembler;
use crate::services::extraction_client::CompletionBackend;

/// 批次进度（completed 单调递增，可跨任务克隆读取）
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl BatchProgress {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// 取消句柄
///
/// 触发后：已开始的块允许跑完，尚未开始的块记为 Cancelled
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// 批次编排器
pub struct BatchOrchestrator {
    pipeline: ChunkPipeline,
    assembler: DocumentAssembler,
    max_concurrent_chunks: usize,
    progress: BatchProgress,
    cancel: CancelHandle,
}

impl BatchOrchestrator {
    pub fn new(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            pipeline: ChunkPipeline::new(config, backend),
            assembler: DocumentAssembler::new(config),
            max_concurrent_chunks: config.max_concurrent_chunks.max(1),
            progress: BatchProgress::default(),
            cancel: CancelHandle::default(),
        }
    }

    /// 替换文档组装器（测试注入顺序标识符生成器和固定时间戳）
    pub fn with_assembler(mut self, assembler: DocumentAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// 供外部读取的进度句柄
    pub fn progress(&self) -> BatchProgress {
        self.progress.clone()
    }

    /// 供外部触发取消的句柄
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// 处理整个批次
    ///
    /// 块级失败汇入报告；只有系统性配置问题会让整个批次返回 Err
    pub async fn run(&mut self, chunks: Vec<TextChunk>) -> Result<BatchReport> {
        let total = chunks.len();
        self.progress.total.store(total, Ordering::SeqCst);

        if chunks.is_empty() {
            return Ok(BatchReport {
                total_chunks: 0,
                succeeded: 0,
                failed: 0,
                records: Vec::new(),
                failures: Vec::new(),
            });
        }

        info!("🚀 开始处理批次，共 {} 个文本块", total);

        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(total);

        // 首块先行：认证/请求格式类错误在这里暴露时立即终止
        let first = if self.cancel.is_cancelled() {
            ChunkOutcome::cancelled(0, &chunks[0])
        } else {
            self.pipeline.run(0, &chunks[0]).await
        };
        self.progress.completed.fetch_add(1, Ordering::SeqCst);

        if let ChunkState::Failed(FailureKind::BackendRejected) = first.state {
            let detail = first
                .failures
                .first()
                .map(|f| f.reason.clone())
                .unwrap_or_default();
            error!("❌ 首个文本块即被后端拒绝，终止批次: {}", detail);
            return Err(AppError::pipeline_misconfigured(detail).into());
        }
        outcomes.push(first);

        // 其余块并发处理
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_chunks));
        let mut handles = Vec::new();

        for (batch_index, chunk) in chunks.iter().enumerate().skip(1) {
            let permit = semaphore.clone().acquire_owned().await?;
            let pipeline = self.pipeline.clone();
            let chunk = chunk.clone();
            let cancel = self.cancel.clone();
            let completed = self.progress.completed.clone();

            let chunk_ref = ChunkRef::new(&chunk);
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = if cancel.is_cancelled() {
                    ChunkOutcome::cancelled(batch_index, &chunk)
                } else {
                    pipeline.run(batch_index, &chunk).await
                };
                completed.fetch_add(1, Ordering::SeqCst);
                outcome
            });
            handles.push((batch_index, chunk_ref, handle));
        }

        // 等待所有任务完成
        let joined = futures::future::join_all(
            handles
                .into_iter()
                .map(|(batch_index, chunk_ref, handle)| async move {
                    (batch_index, chunk_ref, handle.await)
                }),
        )
        .await;

        for (batch_index, chunk_ref, result) in joined {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("[块 {}] 任务执行失败: {}", chunk_ref, e);
                    outcomes.push(ChunkOutcome::crashed(
                        batch_index,
                        chunk_ref,
                        format!("任务执行失败: {}", e),
                    ));
                }
            }
        }

        // 确定性合并：按原始块顺序排序后再组装
        outcomes.sort_by_key(|o| o.batch_index);

        let mut failures = Vec::new();
        let mut items = Vec::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for mut outcome in outcomes {
            if outcome.is_failed() {
                failed += 1;
            } else {
                outcome.state = ChunkState::Assembled;
                succeeded += 1;
            }
            failures.append(&mut outcome.failures);
            items.append(&mut outcome.candidates);
        }

        let (records, duplicate_drops) = self.assembler.assemble(items);
        failures.extend(duplicate_drops);

        info!(
            "📦 批次处理完成: {} 块成功 / {} 块失败，产出 {} 条记录",
            succeeded,
            failed,
            records.len()
        );

        Ok(BatchReport {
            total_chunks: total,
            succeeded,
            failed,
            records,
            failures,
        })
    }
}

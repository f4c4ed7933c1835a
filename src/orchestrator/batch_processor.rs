//! 应用处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文件的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：初始化日志文件、校验 API 密钥、创建后端客户端
//! 2. **批量加载**：扫描输入目录，把所有中间 JSON 文件切成统一的块序列
//! 3. **向下委托**：委托 BatchOrchestrator 完成并发提取与合并
//! 4. **结果落盘**：把最终记录渲染为待导入文档写入输出文件
//! 5. **全局统计**：汇总成功/失败并逐条列出失败明细

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::loaders::load_all_json_files;
use crate::models::question::records_to_documents;
use crate::models::report::BatchReport;
use crate::orchestrator::batch_runner::BatchOrchestrator;
use crate::services::extraction_client::{CompletionBackend, OpenAiBackend};
use crate::utils::logging::{init_log_file, log_chunks_loaded, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    backend: Arc<dyn CompletionBackend>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 检查API密钥
        if !config.validate_api_key() {
            return Err(AppError::missing_api_key("SILICONFLOW_API_KEY").into());
        }

        let backend: Arc<dyn CompletionBackend> = Arc::new(OpenAiBackend::new(&config));

        Ok(Self { config, backend })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        // 加载所有待处理的文本块
        info!("\n📁 正在扫描待处理的JSON文件...");
        let chunks = load_all_json_files(
            &self.config.input_folder,
            self.config.max_segments_per_chunk,
        )
        .await?;

        if chunks.is_empty() {
            warn!("⚠️ 没有找到待处理的JSON文件，程序结束");
            return Ok(());
        }

        log_chunks_loaded(chunks.len(), self.config.max_concurrent_chunks);

        // 处理批次
        let mut orchestrator = BatchOrchestrator::new(&self.config, self.backend.clone());
        let report = orchestrator.run(chunks).await?;

        // 逐条列出失败明细
        log_failures(&report);

        // 没有任何产出按失败运行处理
        if report.is_empty_run() {
            error!("❌ 本次运行没有产出任何题目记录");
            return Err(
                AppError::pipeline_empty_batch(report.failed, report.total_chunks).into(),
            );
        }

        // 渲染为待导入文档并落盘
        write_output(&self.config.output_file, &report).await?;

        print_final_stats(&report, &self.config);

        Ok(())
    }
}

fn log_failures(report: &BatchReport) {
    if report.failures.is_empty() {
        return;
    }
    warn!("⚠️ 共 {} 条失败记录:", report.failures.len());
    for failure in &report.failures {
        warn!("  - {}", failure);
    }
}

async fn write_output(output_file: &str, report: &BatchReport) -> Result<()> {
    let documents = records_to_documents(&report.records);
    let json = serde_json::to_string_pretty(&documents)?;

    if let Some(parent) = Path::new(output_file).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建输出目录: {}", parent.display()))?;
        }
    }

    tokio::fs::write(output_file, json)
        .await
        .with_context(|| format!("无法写入输出文件: {}", output_file))?;

    info!("💾 结果已保存到: {}", output_file);
    Ok(())
}

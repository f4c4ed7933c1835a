use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::models::report::BatchReport;

/// 初始化 tracing 日志输出
///
/// 通过 RUST_LOG 环境变量控制级别，默认 info
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题目提取处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目提取流水线模式");
    info!("🤖 模型: {}", config.model_name);
    info!("📊 最大并发数: {}", config.max_concurrent_chunks);
    info!("{}", "=".repeat(60));
}

/// 记录文本块加载信息
///
/// # 参数
/// - `total`: 文本块总数
/// - `max_concurrent`: 最大并发数
pub fn log_chunks_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 共切分出 {} 个待处理的文本块", total);
    info!("📋 将以最多 {} 个并发的方式处理\n", max_concurrent);
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功块: {}/{}", report.succeeded, report.total_chunks);
    info!("❌ 失败块: {}", report.failed);
    info!("📝 产出题目: {} 道", report.records.len());
    info!("⚠️ 失败明细: {} 条", report.failures.len());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用处理器
//! - 管理应用生命周期（初始化、运行、落盘）
//! - 批量加载输入文件（Vec<TextChunk>）
//! - 输出全局统计信息
//!
//! ### `batch_runner` - 批次编排器
//! - 控制并发数量（Semaphore）
//! - 首块先行，永久错误短路
//! - 确定性合并 + 文档组装
//!
//! ### `chunk_pipeline` - 单块流水线
//! - 定义单个文本块的完整处理流程
//! - 提示词 → 补全 → 解析 → 校验
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理输入文件集合)
//!     ↓
//! batch_runner (处理 Vec<TextChunk>)
//!     ↓
//! chunk_pipeline (处理单个 TextChunk)
//!     ↓
//! services (能力层：prompt / extract / parse / validate / assemble)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_runner 管批次，chunk_pipeline 管单块
//! 2. **向下依赖**：编排层 → services → models
//! 3. **无业务逻辑**：只做调度和统计，不做具体提取判断

pub mod batch_processor;
pub mod batch_runner;
pub mod chunk_pipeline;

// 重新导出主要类型
pub use batch_processor::App;
pub use batch_runner::{BatchOrchestrator, BatchProgress, CancelHandle};
pub use chunk_pipeline::{ChunkOutcome, ChunkPipeline, ChunkState};

//! 文档组装服务 - 业务能力层
//!
//! 把已校验的题目盖戳成可入库的最终记录：
//! - 每条记录、每个选项分配独立标识符
//! - 同一批次共享同一时间戳
//! - 作答统计清零，`order` 按最终接受顺序从零递增
//! - 按归一化内容指纹去重，后出现者丢弃并记入失败列表

use crate::config::Config;
use crate::models::chunk::ChunkRef;
use crate::models::question::{
    QuestionOption, QuestionRecord, QuestionStats, ValidatedCandidate,
};
use crate::models::report::{ChunkFailure, PipelineStage};
use crate::utils::logging::truncate_text;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// 标识符生成器
///
/// 生产环境使用随机 UUID；测试通过顺序生成器获得可复现的标识符
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> String;
}

/// 随机 UUID v4 生成器
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// 带前缀的顺序生成器，相同输入总是产出相同标识符
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}-{:06}", self.prefix, self.counter)
    }
}

/// 归一化内容指纹：小写、空白折叠
pub fn content_fingerprint(content: &str) -> String {
    content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 文档组装器
pub struct DocumentAssembler {
    id_generator: Box<dyn IdGenerator>,
    dedupe_enabled: bool,
    /// 测试用的固定时间戳；生产环境每次组装取当前时间
    fixed_time: Option<DateTime<Utc>>,
}

impl DocumentAssembler {
    pub fn new(config: &Config) -> Self {
        Self {
            id_generator: Box::new(UuidGenerator),
            dedupe_enabled: config.dedupe_enabled,
            fixed_time: None,
        }
    }

    /// 替换标识符生成器（测试可复现性）
    pub fn with_id_generator(mut self, generator: Box<dyn IdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// 固定组装时间戳（测试可复现性）
    pub fn with_fixed_time(mut self, time: DateTime<Utc>) -> Self {
        self.fixed_time = Some(time);
        self
    }

    /// 组装一批已校验题目
    ///
    /// 输入必须已按"块顺序、块内候选顺序"排好；
    /// 返回最终记录和重复丢弃的失败记录
    pub fn assemble(
        &mut self,
        items: Vec<(ChunkRef, ValidatedCandidate)>,
    ) -> (Vec<QuestionRecord>, Vec<ChunkFailure>) {
        let now = self.fixed_time.unwrap_or_else(Utc::now);
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut drops = Vec::new();

        for (chunk, candidate) in items {
            if self.dedupe_enabled {
                let fingerprint = content_fingerprint(&candidate.content);
                if !seen.insert(fingerprint) {
                    debug!("🔁 [{}] 重复题目已丢弃: {}", chunk, truncate_text(&candidate.content, 40));
                    drops.push(ChunkFailure::new(
                        chunk,
                        PipelineStage::Assemble,
                        format!("重复题目已丢弃: {}", truncate_text(&candidate.content, 40)),
                    ));
                    continue;
                }
            }

            let options: Vec<QuestionOption> = candidate
                .options
                .into_iter()
                .map(|entry| QuestionOption {
                    id: self.id_generator.next_id(),
                    key: entry.key,
                    content: entry.content,
                })
                .collect();

            records.push(QuestionRecord {
                id: self.id_generator.next_id(),
                title: candidate.title,
                content: candidate.content,
                question_type: candidate.question_type,
                options,
                correct_answer: candidate.correct_answer,
                explanation: candidate.explanation,
                difficulty: candidate.difficulty,
                subject: candidate.subject,
                module: candidate.module,
                sub_module: candidate.sub_module,
                tags: candidate.tags,
                order: records.len(),
                is_active: true,
                stats: QuestionStats::default(),
                created_at: now,
                updated_at: now,
            });
        }

        (records, drops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, OptionEntry, QuestionType};
    use chrono::TimeZone;

    fn candidate(content: &str) -> ValidatedCandidate {
        ValidatedCandidate {
            title: "法律刷题课".to_string(),
            content: content.to_string(),
            question_type: QuestionType::Single,
            options: vec![
                OptionEntry {
                    key: "A".to_string(),
                    content: "甲".to_string(),
                },
                OptionEntry {
                    key: "B".to_string(),
                    content: "乙".to_string(),
                },
            ],
            correct_answer: vec!["A".to_string()],
            explanation: String::new(),
            difficulty: Difficulty::Medium,
            subject: "gongji".to_string(),
            module: "law".to_string(),
            sub_module: String::new(),
            tags: vec!["法律".to_string()],
        }
    }

    fn chunk_ref(seq: usize) -> ChunkRef {
        ChunkRef {
            source_id: "part1".to_string(),
            sequence_index: seq,
            sub_index: None,
        }
    }

    fn test_assembler() -> DocumentAssembler {
        DocumentAssembler::new(&Config::default())
            .with_id_generator(Box::new(SequentialIdGenerator::new("id")))
            .with_fixed_time(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_order_and_stamps() {
        let mut assembler = test_assembler();
        let (records, drops) = assembler.assemble(vec![
            (chunk_ref(0), candidate("题目一")),
            (chunk_ref(1), candidate("题目二")),
        ]);

        assert!(drops.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order, 0);
        assert_eq!(records[1].order, 1);
        // 批次内时间戳一致
        assert_eq!(records[0].created_at, records[1].created_at);
        assert_eq!(records[0].created_at, records[0].updated_at);
        assert!(records.iter().all(|r| r.is_active));
        assert!(records.iter().all(|r| r.stats.total_attempts == 0));
    }

    #[test]
    fn test_sequential_ids_are_reproducible() {
        let (records, _) = test_assembler().assemble(vec![(chunk_ref(0), candidate("题目一"))]);
        let (records2, _) = test_assembler().assemble(vec![(chunk_ref(0), candidate("题目一"))]);

        // 选项先分配标识符，记录随后
        assert_eq!(records[0].options[0].id, "id-000001");
        assert_eq!(records[0].options[1].id, "id-000002");
        assert_eq!(records[0].id, "id-000003");
        assert_eq!(records[0].id, records2[0].id);
    }

    #[test]
    fn test_duplicate_dropped_and_reported() {
        let mut assembler = test_assembler();
        let (records, drops) = assembler.assemble(vec![
            (chunk_ref(0), candidate("什么是宪法？")),
            // 大小写和空白差异不影响指纹
            (chunk_ref(1), candidate("  什么是宪法？  ")),
            (chunk_ref(2), candidate("另一道题")),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].chunk.sequence_index, 1);
        assert_eq!(drops[0].stage, PipelineStage::Assemble);
        // 丢弃重复后 order 依然连续
        assert_eq!(records[1].order, 1);
    }

    #[test]
    fn test_dedupe_can_be_disabled() {
        let config = Config {
            dedupe_enabled: false,
            ..Config::default()
        };
        let mut assembler = DocumentAssembler::new(&config)
            .with_id_generator(Box::new(SequentialIdGenerator::new("id")));

        let (records, drops) = assembler.assemble(vec![
            (chunk_ref(0), candidate("同一道题")),
            (chunk_ref(1), candidate("同一道题")),
        ]);

        assert_eq!(records.len(), 2);
        assert!(drops.is_empty());
    }

    #[test]
    fn test_fingerprint_normalization() {
        assert_eq!(
            content_fingerprint("What  Is\nLaw?"),
            content_fingerprint("what is law?")
        );
        assert_ne!(content_fingerprint("甲"), content_fingerprint("乙"));
    }
}

//! 题目数据模型
//!
//! - `QuestionCandidate`：从模型补全中解析出的未校验候选，字段宽容缺失
//! - `ValidatedCandidate`：通过校验、字段已补全的中间形态
//! - `QuestionRecord`：盖戳完毕、可直接入库的最终记录

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 题目类型（固定枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 单选题
    Single,
    /// 多选题
    Multiple,
    /// 判断题
    TrueFalse,
    /// 填空题
    FillInTheBlank,
    /// 简答题
    ShortAnswer,
}

/// 中文题型标签到枚举的映射
static TYPE_ALIASES: phf::Map<&'static str, QuestionType> = phf::phf_map! {
    "单选" => QuestionType::Single,
    "单选题" => QuestionType::Single,
    "多选" => QuestionType::Multiple,
    "多选题" => QuestionType::Multiple,
    "判断" => QuestionType::TrueFalse,
    "判断题" => QuestionType::TrueFalse,
    "填空题" => QuestionType::FillInTheBlank,
    "简答题" => QuestionType::ShortAnswer,
};

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillInTheBlank => "fill_in_the_blank",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    /// 解析题型标签，同时接受英文标识和中文别名
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if let Some(t) = TYPE_ALIASES.get(label) {
            return Some(*t);
        }
        match label {
            "single" => Some(QuestionType::Single),
            "multiple" => Some(QuestionType::Multiple),
            "true_false" => Some(QuestionType::TrueFalse),
            "fill_in_the_blank" => Some(QuestionType::FillInTheBlank),
            "short_answer" => Some(QuestionType::ShortAnswer),
            _ => None,
        }
    }

    /// 是否需要选项列表
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionType::Single | QuestionType::Multiple | QuestionType::TrueFalse
        )
    }
}

/// 难度级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// 中文难度标签到枚举的映射
static DIFFICULTY_ALIASES: phf::Map<&'static str, Difficulty> = phf::phf_map! {
    "简单" => Difficulty::Easy,
    "中等" => Difficulty::Medium,
    "困难" => Difficulty::Hard,
};

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// 解析难度标签，同时接受英文标识和中文别名
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if let Some(d) = DIFFICULTY_ALIASES.get(label) {
            return Some(*d);
        }
        match label {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// 候选题目的选项（解析自模型输出，宽容缺失）
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateOption {
    /// 选项键（A/B/C/D），兼容模型输出的 "label" 字段名
    #[serde(alias = "label")]
    pub key: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// 从模型补全中解析出的候选题目
///
/// 字段全部可缺省，多余字段忽略；是否接受由校验阶段决定
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuestionCandidate {
    pub title: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub options: Option<Vec<CandidateOption>>,
    #[serde(rename = "correctAnswer", deserialize_with = "deserialize_answers")]
    pub correct_answer: Vec<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
    pub subject: Option<String>,
    pub module: Option<String>,
    #[serde(rename = "subModule")]
    pub sub_module: Option<String>,
    pub tags: Vec<String>,
}

// Helper: correctAnswer 既可能是字符串也可能是数组
fn deserialize_answers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct AnswerVisitor;

    impl<'de> Visitor<'de> for AnswerVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a sequence of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut answers = Vec::new();
            while let Some(item) = seq.next_element::<Value>()? {
                match item {
                    Value::String(s) => answers.push(s),
                    other => answers.push(other.to_string()),
                }
            }
            Ok(answers)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(AnswerVisitor)
}

/// 校验通过后的选项（键和内容均已确定）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub key: String,
    pub content: String,
}

/// 通过校验、字段已补全的题目
///
/// 尚未分配标识符与时间戳，由文档组装器盖戳后成为 QuestionRecord
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCandidate {
    pub title: String,
    pub content: String,
    pub question_type: QuestionType,
    pub options: Vec<OptionEntry>,
    pub correct_answer: Vec<String>,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub subject: String,
    pub module: String,
    pub sub_module: String,
    pub tags: Vec<String>,
}

/// 题目作答统计（新记录全部清零）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionStats {
    #[serde(rename = "totalAttempts")]
    pub total_attempts: u64,
    #[serde(rename = "correctAttempts")]
    pub correct_attempts: u64,
    pub accuracy: u64,
}

/// 最终记录中的选项（带独立标识符）
#[derive(Debug, Clone, Serialize)]
pub struct QuestionOption {
    pub id: String,
    pub key: String,
    pub content: String,
}

/// 校验并盖戳完毕的题目记录
///
/// 组装完成后不可变，归属 BatchReport 直至交给外部导入方
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// 非选择类题型为空
    pub options: Vec<QuestionOption>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: Vec<String>,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub subject: String,
    pub module: String,
    #[serde(rename = "subModule")]
    pub sub_module: String,
    pub tags: Vec<String>,
    /// 批次内严格递增的序号
    pub order: usize,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub stats: QuestionStats,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl QuestionRecord {
    /// 渲染为 MongoDB 扩展 JSON 文档，供批量导入工具直接插入
    pub fn to_document(&self) -> Value {
        let options = if self.question_type.has_options() {
            Value::Array(
                self.options
                    .iter()
                    .map(|opt| {
                        json!({
                            "_id": {"$oid": opt.id},
                            "key": opt.key,
                            "content": opt.content,
                        })
                    })
                    .collect(),
            )
        } else {
            Value::Null
        };

        json!({
            "_id": {"$oid": self.id},
            "title": self.title,
            "content": self.content,
            "type": self.question_type.as_str(),
            "options": options,
            "correctAnswer": self.correct_answer,
            "explanation": self.explanation,
            "difficulty": self.difficulty.as_str(),
            "subject": self.subject,
            "module": self.module,
            "subModule": self.sub_module,
            "tags": self.tags,
            "order": self.order,
            "isActive": self.is_active,
            "stats": {
                "totalAttempts": self.stats.total_attempts,
                "correctAttempts": self.stats.correct_attempts,
                "accuracy": self.stats.accuracy,
            },
            "createdAt": {"$date": format_mongo_date(&self.created_at)},
            "updatedAt": {"$date": format_mongo_date(&self.updated_at)},
        })
    }
}

/// 将一批记录渲染为待导入的文档数组
pub fn records_to_documents(records: &[QuestionRecord]) -> Value {
    Value::Array(records.iter().map(QuestionRecord::to_document).collect())
}

// 时间统一按东八区落库，毫秒精度
fn format_mongo_date(dt: &DateTime<Utc>) -> String {
    let shifted = *dt + Duration::hours(8);
    format!("{}+08:00", shifted.format("%Y-%m-%dT%H:%M:%S%.3f"))
}

//! 目标题目结构描述
//!
//! 提示词构建与候选校验共用同一份结构描述，
//! 保证模型被要求输出的结构与校验接受的结构一致。

use serde::{Deserialize, Serialize};

/// 题目记录的可配置默认字段值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordDefaults {
    pub title: String,
    pub subject: String,
    pub module: String,
    pub sub_module: String,
    pub tags: Vec<String>,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            title: "法律刷题课".to_string(),
            subject: "gongji".to_string(),
            module: "law".to_string(),
            sub_module: String::new(),
            tags: vec!["法律".to_string()],
        }
    }
}

/// 目标题目结构的描述
#[derive(Debug, Clone, Default)]
pub struct SchemaSpec {
    pub defaults: RecordDefaults,
}

impl SchemaSpec {
    pub fn new(defaults: RecordDefaults) -> Self {
        Self { defaults }
    }

    /// 输出格式示例，逐字嵌入每条提示词
    pub fn schema_example(&self) -> &'static str {
        r#"{
  "questions": [
    {
      "content": "题目题干",
      "options": [
        {"key": "A", "content": "选项内容"},
        {"key": "B", "content": "选项内容"}
      ],
      "correctAnswer": ["A"],
      "explanation": "解析",
      "difficulty": "medium"
    }
  ]
}"#
    }

    /// 题型取值枚举，逐字嵌入每条提示词
    pub fn type_enumeration(&self) -> &'static str {
        "single / multiple / true_false / fill_in_the_blank / short_answer"
    }

    /// 难度取值枚举，逐字嵌入每条提示词
    pub fn difficulty_enumeration(&self) -> &'static str {
        "easy / medium / hard"
    }
}

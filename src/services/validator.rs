//! 候选校验服务 - 业务能力层
//!
//! 候选题目 → 已校验题目 | 拒绝原因
//!
//! 硬性规则只有四条（题型、题干、选项、难度），其余字段缺失一律
//! 按可配置默认值补全后接受。拒绝原因是封闭集合，便于上层统计报告。

use crate::models::question::{
    CandidateOption, Difficulty, OptionEntry, QuestionCandidate, QuestionType, ValidatedCandidate,
};
use crate::models::schema::{RecordDefaults, SchemaSpec};
use thiserror::Error;

/// 校验拒绝原因（封闭集合）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("无法识别的题目类型: {0}")]
    InvalidType(String),
    #[error("题干内容为空")]
    MissingContent,
    #[error("选项不合法: {0}")]
    InvalidOptions(String),
    #[error("无法识别的难度: {0}")]
    InvalidDifficulty(String),
}

/// 候选校验器
#[derive(Clone)]
pub struct Validator {
    defaults: RecordDefaults,
}

impl Validator {
    pub fn new(schema: &SchemaSpec) -> Self {
        Self {
            defaults: schema.defaults.clone(),
        }
    }

    /// 校验单个候选题目
    pub fn validate(&self, candidate: QuestionCandidate) -> Result<ValidatedCandidate, RejectReason> {
        let content = candidate.content.trim().to_string();
        if content.is_empty() {
            return Err(RejectReason::MissingContent);
        }

        let question_type = resolve_type(&candidate, &content)?;

        let mut options = normalize_options(candidate.options.as_deref().unwrap_or(&[]));

        // 判断题：模型经常漏掉选项，按标准正确/错误补全
        if question_type == QuestionType::TrueFalse {
            let has_correct = options.iter().any(|o| o.content.contains("正确"));
            let has_wrong = options.iter().any(|o| o.content.contains("错误"));
            if !has_correct || !has_wrong {
                options = vec![
                    OptionEntry {
                        key: "A".to_string(),
                        content: "正确".to_string(),
                    },
                    OptionEntry {
                        key: "B".to_string(),
                        content: "错误".to_string(),
                    },
                ];
            }
        }

        let correct_answer: Vec<String> = candidate
            .correct_answer
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        match question_type {
            QuestionType::Single | QuestionType::Multiple => {
                check_choice_options(&options, &correct_answer)?;
            }
            QuestionType::TrueFalse => {}
            QuestionType::FillInTheBlank | QuestionType::ShortAnswer => {
                // 非选择类题型不携带选项
                options.clear();
            }
        }

        let difficulty = match candidate.difficulty.as_deref().map(str::trim) {
            None | Some("") => Difficulty::Medium,
            Some(label) => {
                Difficulty::parse(label).ok_or_else(|| RejectReason::InvalidDifficulty(label.to_string()))?
            }
        };

        let defaults = &self.defaults;
        Ok(ValidatedCandidate {
            title: non_empty_or(candidate.title, &defaults.title),
            content,
            question_type,
            options,
            correct_answer,
            explanation: candidate.explanation.unwrap_or_default(),
            difficulty,
            subject: non_empty_or(candidate.subject, &defaults.subject),
            module: non_empty_or(candidate.module, &defaults.module),
            sub_module: non_empty_or(candidate.sub_module, &defaults.sub_module),
            tags: if candidate.tags.is_empty() {
                defaults.tags.clone()
            } else {
                candidate.tags
            },
        })
    }
}

// 显式题型标签优先；缺失时按题干标记和答案数量推断
fn resolve_type(candidate: &QuestionCandidate, content: &str) -> Result<QuestionType, RejectReason> {
    if let Some(label) = candidate
        .question_type
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        return QuestionType::parse(label).ok_or_else(|| RejectReason::InvalidType(label.to_string()));
    }

    if content.contains("【判断】") {
        return Ok(QuestionType::TrueFalse);
    }
    if content.contains("【多选】") || candidate.correct_answer.len() > 1 {
        return Ok(QuestionType::Multiple);
    }
    if candidate
        .options
        .as_ref()
        .map(|o| !o.is_empty())
        .unwrap_or(false)
    {
        return Ok(QuestionType::Single);
    }
    Ok(QuestionType::ShortAnswer)
}

// 丢弃没有键的选项，键去掉首尾空白
fn normalize_options(options: &[CandidateOption]) -> Vec<OptionEntry> {
    options
        .iter()
        .filter_map(|o| {
            let key = o.key.as_deref()?.trim().to_string();
            if key.is_empty() {
                return None;
            }
            Some(OptionEntry {
                key,
                content: o.content.trim().to_string(),
            })
        })
        .collect()
}

// 选择题硬性规则：至少两个选项、键唯一、答案非空且都指向已有选项
fn check_choice_options(
    options: &[OptionEntry],
    correct_answer: &[String],
) -> Result<(), RejectReason> {
    if options.len() < 2 {
        return Err(RejectReason::InvalidOptions(format!(
            "选项数量不足: {}",
            options.len()
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for option in options {
        if !seen.insert(option.key.as_str()) {
            return Err(RejectReason::InvalidOptions(format!(
                "选项键重复: {}",
                option.key
            )));
        }
    }

    if correct_answer.is_empty() {
        return Err(RejectReason::InvalidOptions("缺少正确答案".to_string()));
    }
    for answer in correct_answer {
        if !seen.contains(answer.as_str()) {
            return Err(RejectReason::InvalidOptions(format!(
                "正确答案 {} 不在选项中",
                answer
            )));
        }
    }

    Ok(())
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(&SchemaSpec::default())
    }

    fn choice_candidate() -> QuestionCandidate {
        serde_json::from_str(
            r#"{
                "content": "下列说法正确的是",
                "type": "single",
                "options": [
                    {"key": "A", "content": "甲"},
                    {"key": "B", "content": "乙"}
                ],
                "correctAnswer": ["A"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_accepts_valid_single_choice() {
        let validated = validator().validate(choice_candidate()).unwrap();
        assert_eq!(validated.question_type, QuestionType::Single);
        assert_eq!(validated.options.len(), 2);
        assert_eq!(validated.correct_answer, vec!["A"]);
        // 软字段按默认值补全
        assert_eq!(validated.difficulty, Difficulty::Medium);
        assert_eq!(validated.subject, "gongji");
        assert_eq!(validated.tags, vec!["法律"]);
        assert_eq!(validated.explanation, "");
    }

    #[test]
    fn test_rejects_unknown_type() {
        let mut candidate = choice_candidate();
        candidate.question_type = Some("计算题".to_string());
        assert_eq!(
            validator().validate(candidate),
            Err(RejectReason::InvalidType("计算题".to_string()))
        );
    }

    #[test]
    fn test_rejects_empty_content() {
        let mut candidate = choice_candidate();
        candidate.content = "   ".to_string();
        assert_eq!(validator().validate(candidate), Err(RejectReason::MissingContent));
    }

    #[test]
    fn test_rejects_too_few_options() {
        let mut candidate = choice_candidate();
        candidate.options = Some(
            candidate
                .options
                .unwrap()
                .into_iter()
                .take(1)
                .collect(),
        );
        assert!(matches!(
            validator().validate(candidate),
            Err(RejectReason::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_option_keys() {
        let candidate: QuestionCandidate = serde_json::from_str(
            r#"{
                "content": "题干",
                "type": "single",
                "options": [
                    {"key": "A", "content": "甲"},
                    {"key": "A", "content": "乙"}
                ],
                "correctAnswer": ["A"]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            validator().validate(candidate),
            Err(RejectReason::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_rejects_answer_not_in_options() {
        let mut candidate = choice_candidate();
        candidate.correct_answer = vec!["C".to_string()];
        assert!(matches!(
            validator().validate(candidate),
            Err(RejectReason::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_rejects_missing_answer_for_choice() {
        let mut candidate = choice_candidate();
        candidate.correct_answer = Vec::new();
        assert!(matches!(
            validator().validate(candidate),
            Err(RejectReason::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_chinese_difficulty_mapped() {
        let mut candidate = choice_candidate();
        candidate.difficulty = Some("困难".to_string());
        let validated = validator().validate(candidate).unwrap();
        assert_eq!(validated.difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_rejects_unknown_difficulty() {
        let mut candidate = choice_candidate();
        candidate.difficulty = Some("地狱".to_string());
        assert_eq!(
            validator().validate(candidate),
            Err(RejectReason::InvalidDifficulty("地狱".to_string()))
        );
    }

    #[test]
    fn test_infers_multiple_from_answer_count() {
        let candidate: QuestionCandidate = serde_json::from_str(
            r#"{
                "content": "下列哪些说法正确",
                "options": [
                    {"key": "A", "content": "甲"},
                    {"key": "B", "content": "乙"},
                    {"key": "C", "content": "丙"}
                ],
                "correctAnswer": ["A", "B"]
            }"#,
        )
        .unwrap();
        let validated = validator().validate(candidate).unwrap();
        assert_eq!(validated.question_type, QuestionType::Multiple);
    }

    #[test]
    fn test_infers_short_answer_without_options() {
        let candidate: QuestionCandidate =
            serde_json::from_str(r#"{"content": "简述依法治国的含义"}"#).unwrap();
        let validated = validator().validate(candidate).unwrap();
        assert_eq!(validated.question_type, QuestionType::ShortAnswer);
        assert!(validated.options.is_empty());
    }

    #[test]
    fn test_true_false_options_completed() {
        let candidate: QuestionCandidate = serde_json::from_str(
            r#"{"content": "【判断】宪法是国家的根本法", "correctAnswer": ["A"]}"#,
        )
        .unwrap();
        let validated = validator().validate(candidate).unwrap();
        assert_eq!(validated.question_type, QuestionType::TrueFalse);
        assert_eq!(validated.options.len(), 2);
        assert_eq!(validated.options[0].content, "正确");
        assert_eq!(validated.options[1].content, "错误");
    }

    #[test]
    fn test_fill_in_the_blank_clears_options() {
        let candidate: QuestionCandidate = serde_json::from_str(
            r#"{
                "content": "我国的根本政治制度是____",
                "type": "填空题",
                "options": [{"key": "A", "content": "多余选项"}],
                "correctAnswer": ["人民代表大会制度"]
            }"#,
        )
        .unwrap();
        let validated = validator().validate(candidate).unwrap();
        assert_eq!(validated.question_type, QuestionType::FillInTheBlank);
        assert!(validated.options.is_empty());
        assert_eq!(validated.correct_answer, vec!["人民代表大会制度"]);
    }
}

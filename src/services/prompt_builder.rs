//! 提示词构建服务 - 业务能力层
//!
//! 只负责"文本块 → 补全请求"的构建，不关心流程
//!
//! - 超出 token 预算的块在段落/句子边界切分，子块保持原始顺序
//! - 提取指令与目标结构逐字嵌入每条请求，请求之间彼此独立、可单独重试
//! - 相同的块和结构描述总是产出字节级相同的提示词

use crate::config::Config;
use crate::models::chunk::{estimate_tokens, CompletionRequest, TextChunk};
use crate::models::schema::SchemaSpec;

/// 提取指令（题目边界识别规则）
const EXTRACTION_INSTRUCTIONS: &str = r#"你是一个题目提取专家。从文本中识别完整的题目并转换为JSON格式。

识别规则：
- 题目以数字开头（如"1."、"2."）
- 题型标识：【单选】、【多选】、【判断】
- 选项以A、B、C、D开头
- 跳过残缺题目、页眉页脚、目录等无关内容

输出要求：
- 只输出标准JSON格式，不要markdown标记
- 每个题目必须有完整的题干和选项
- 如果没有找到完整题目，返回空数组
- 推断正确答案和解析"#;

/// 提示词构建服务
#[derive(Clone)]
pub struct PromptBuilder {
    model_name: String,
    max_tokens: u32,
    temperature: f32,
    /// 单条提示词的 token 预算
    max_chunk_tokens: usize,
}

impl PromptBuilder {
    /// 从配置创建构建器
    pub fn new(config: &Config) -> Self {
        Self {
            model_name: config.model_name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_chunk_tokens: config.max_chunk_tokens.max(1),
        }
    }

    /// 为一个文本块构建一条或多条补全请求
    ///
    /// 块未超预算时恰好一条请求（sub_index = 0）
    pub fn build(&self, chunk: &TextChunk, schema: &SchemaSpec) -> Vec<CompletionRequest> {
        let pieces = if chunk.estimated_token_count > self.max_chunk_tokens {
            split_text(&chunk.raw_text, self.max_chunk_tokens)
        } else {
            vec![chunk.raw_text.clone()]
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(sub_index, text)| {
                let prompt_text = self.render_prompt(&text, schema);
                let sub_chunk = TextChunk {
                    source_id: chunk.source_id.clone(),
                    sequence_index: chunk.sequence_index,
                    estimated_token_count: estimate_tokens(&text),
                    raw_text: text,
                };
                CompletionRequest {
                    chunk: sub_chunk,
                    sub_index,
                    prompt_text,
                    model_name: self.model_name.clone(),
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                }
            })
            .collect()
    }

    // 指令 + 结构 + 枚举 + 文本，顺序和措辞固定
    fn render_prompt(&self, text: &str, schema: &SchemaSpec) -> String {
        format!(
            "{instructions}\n\n输出格式：\n{example}\n\ntype 取值：{types}\ndifficulty 取值：{difficulties}\n\n请从以下文本中提取完整的题目。只处理有明确题干的题目，跳过残缺内容。\n\n文本内容：\n{text}\n\n直接输出JSON：",
            instructions = EXTRACTION_INSTRUCTIONS,
            example = schema.schema_example(),
            types = schema.type_enumeration(),
            difficulties = schema.difficulty_enumeration(),
            text = text,
        )
    }
}

/// 在段落边界切分文本为不超预算的最少片段
///
/// 单个段落超预算时退到句子边界，单个句子仍超预算时按字符硬切
fn split_text(text: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for paragraph in text.split_inclusive('\n') {
        if estimate_tokens(paragraph) > budget {
            // 段落本身超预算：先冲刷累积内容，再按句子切
            flush(&mut pieces, &mut current);
            for sentence_piece in split_sentences(paragraph, budget) {
                append_bounded(&mut pieces, &mut current, &sentence_piece, budget);
            }
            continue;
        }
        append_bounded(&mut pieces, &mut current, paragraph, budget);
    }
    flush(&mut pieces, &mut current);

    if pieces.is_empty() {
        pieces.push(text.to_string());
    }
    pieces
}

// 把一个不超预算的片段并入当前累积，装不下就先冲刷
fn append_bounded(pieces: &mut Vec<String>, current: &mut String, piece: &str, budget: usize) {
    if !current.is_empty() && estimate_tokens(current) + estimate_tokens(piece) > budget {
        flush(pieces, current);
    }
    current.push_str(piece);
}

fn flush(pieces: &mut Vec<String>, current: &mut String) {
    if !current.trim().is_empty() {
        pieces.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

// 按中英文句末标点切分，超长句子按字符硬切
fn split_sentences(paragraph: &str, budget: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in paragraph.chars() {
        current.push(c);
        let terminal = matches!(c, '。' | '！' | '？' | '；' | '.' | '!' | '?' | ';');
        if terminal || estimate_tokens(&current) >= budget {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(max_chunk_tokens: usize) -> PromptBuilder {
        let config = Config {
            max_chunk_tokens,
            ..Config::default()
        };
        PromptBuilder::new(&config)
    }

    #[test]
    fn test_build_single_request_for_small_chunk() {
        let chunk = TextChunk::new("part1", 0, "1. 某题 A.对 B.错");
        let requests = builder(6000).build(&chunk, &SchemaSpec::default());

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].sub_index, 0);
        assert!(requests[0].prompt_text.contains("某题"));
        // 指令与枚举必须出现在请求里
        assert!(requests[0].prompt_text.contains("题目提取专家"));
        assert!(requests[0].prompt_text.contains("fill_in_the_blank"));
        assert!(requests[0].prompt_text.contains("easy / medium / hard"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let chunk = TextChunk::new("part1", 0, "1. 某题\n2. 另一题");
        let schema = SchemaSpec::default();
        let b = builder(6000);

        let first: Vec<String> = b.build(&chunk, &schema).into_iter().map(|r| r.prompt_text).collect();
        let second: Vec<String> = b.build(&chunk, &schema).into_iter().map(|r| r.prompt_text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_on_paragraph_boundaries() {
        // 每行约 10 token，预算 25：应切成多个子块且保持顺序
        let lines: Vec<String> = (0..6).map(|i| format!("{}. 这是一道测试题目甲乙丙", i + 1)).collect();
        let text = lines.join("\n");
        let chunk = TextChunk::new("part1", 0, text);

        let requests = builder(25).build(&chunk, &SchemaSpec::default());
        assert!(requests.len() > 1);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.sub_index, i);
            assert!(request.chunk.estimated_token_count <= 25);
        }
        // 拼回原文：顺序未被打乱
        let joined: String = requests.iter().map(|r| r.chunk.raw_text.as_str()).collect();
        assert!(joined.starts_with("1. 这是一道测试题目甲乙丙"));
        assert!(joined.contains("6. 这是一道测试题目甲乙丙"));
    }

    #[test]
    fn test_split_oversized_sentence_hard() {
        // 没有任何句读的超长段落也必须被切开
        let text = "甲".repeat(100);
        let pieces = split_text(&text, 30);
        assert!(pieces.len() >= 3);
        for piece in &pieces {
            assert!(estimate_tokens(piece) <= 31);
        }
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_split_preserves_content() {
        let text = "第一句。第二句！第三句？\n第二段内容";
        let pieces = split_text(text, 5);
        assert_eq!(pieces.concat(), text);
    }
}

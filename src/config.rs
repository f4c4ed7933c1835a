use crate::models::schema::RecordDefaults;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// API 密钥的占位默认值，用于判断密钥是否真的配置过
pub const API_KEY_PLACEHOLDER: &str = "YOUR_SILICONFLOW_API_KEY_HERE";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 后端 API 配置 ---
    pub api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    /// 单次补全的最大 token 数
    pub max_tokens: u32,
    pub temperature: f32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 重试配置 ---
    /// 瞬时错误的最大重试次数（总尝试次数 = 重试次数 + 1）
    pub max_retries: usize,
    /// 重试基础延迟（秒），按指数退避
    pub retry_delay_secs: u64,
    /// 频率限制错误的额外等待（秒）
    pub rate_limit_extra_secs: u64,
    // --- 流水线配置 ---
    /// 同时处理的文本块数量
    pub max_concurrent_chunks: usize,
    /// 单条提示词的 token 预算，超出则切分
    pub max_chunk_tokens: usize,
    /// 每个文本块最多包含的文本段数
    pub max_segments_per_chunk: usize,
    /// 是否按内容指纹去重
    pub dedupe_enabled: bool,
    // --- 输入输出 ---
    /// 中间 JSON 文件存放目录
    pub input_folder: String,
    /// 合并后的题目输出文件
    pub output_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 题目记录的默认字段值
    pub defaults: RecordDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            api_base_url: "https://api.qnaigc.com/v1".to_string(),
            model_name: "deepseek-v3-0324".to_string(),
            max_tokens: 8192,
            temperature: 0.1,
            request_timeout_secs: 180,
            max_retries: 3,
            retry_delay_secs: 5,
            rate_limit_extra_secs: 5,
            max_concurrent_chunks: 4,
            max_chunk_tokens: 6000,
            max_segments_per_chunk: 50,
            dedupe_enabled: true,
            input_folder: "input_json".to_string(),
            output_file: "output/questions.json".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            defaults: RecordDefaults::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let default_defaults = RecordDefaults::default();
        Self {
            api_key: std::env::var("SILICONFLOW_API_KEY").unwrap_or(default.api_key),
            api_base_url: std::env::var("SILICONFLOW_API_BASE").unwrap_or(default.api_base_url),
            model_name: std::env::var("SILICONFLOW_MODEL_NAME").unwrap_or(default.model_name),
            max_tokens: std::env::var("MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_tokens),
            temperature: std::env::var("TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.temperature),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_delay_secs: std::env::var("RETRY_DELAY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_delay_secs),
            rate_limit_extra_secs: std::env::var("RATE_LIMIT_EXTRA_DELAY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_extra_secs),
            max_concurrent_chunks: std::env::var("MAX_CONCURRENT_CHUNKS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_chunks),
            max_chunk_tokens: std::env::var("MAX_CHUNK_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_chunk_tokens),
            max_segments_per_chunk: std::env::var("MAX_SEGMENTS_PER_CHUNK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_segments_per_chunk),
            dedupe_enabled: std::env::var("DEDUPE_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.dedupe_enabled),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            defaults: RecordDefaults {
                title: std::env::var("DEFAULT_TITLE").unwrap_or(default_defaults.title),
                subject: std::env::var("DEFAULT_SUBJECT").unwrap_or(default_defaults.subject),
                module: std::env::var("DEFAULT_MODULE").unwrap_or(default_defaults.module),
                sub_module: default_defaults.sub_module,
                tags: default_defaults.tags,
            },
        }
    }

    /// 从 TOML 配置文件加载，缺省字段使用默认值
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;

        Ok(config)
    }

    /// 验证API密钥是否设置
    pub fn validate_api_key(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != API_KEY_PLACEHOLDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_segments_per_chunk, 50);
        assert!(config.dedupe_enabled);
        assert!(!config.validate_api_key());
    }

    #[test]
    fn test_validate_api_key() {
        let config = Config {
            api_key: "sk-real-key".to_string(),
            ..Config::default()
        };
        assert!(config.validate_api_key());
    }

    #[tokio::test]
    async fn test_from_file_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "sk-test"
model_name = "test-model"
max_retries = 5

[defaults]
subject = "fa_lv"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).await.unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model_name, "test-model");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.defaults.subject, "fa_lv");
        // 未指定的字段回落到默认值
        assert_eq!(config.max_tokens, 8192);
    }
}

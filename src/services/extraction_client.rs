//! 提取客户端 - 业务能力层
//!
//! 负责把补全请求发给大模型后端并归类失败：
//! - 瞬时错误（超时 / 网络 / 频率限制）按指数退避重试，重试耗尽降级为块级失败
//! - 永久错误（认证失败 / 请求格式错误）不重试，立即降级
//! - 绝不向调用方抛出错误，失败一律以 CompletionResult::Failure 返回
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 SiliconFlow, DeepSeek, Doubao 等）

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::chunk::{CompletionRequest, CompletionResult, FailureKind};

/// 后端错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Timeout,
    RateLimited,
    AuthFailed,
    MalformedRequest,
    Unknown,
}

/// 补全后端返回的错误
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 瞬时错误可重试，认证/请求格式错误不可重试
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::Timeout | BackendErrorKind::RateLimited | BackendErrorKind::Unknown
        )
    }
}

/// 补全后端：对大模型服务的唯一抽象
///
/// 无状态的请求/响应调用，方便用桩实现替换做测试
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        prompt_text: &str,
        model_name: &str,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, BackendError>;
}

/// OpenAI 兼容后端
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
}

impl OpenAiBackend {
    /// 从配置创建后端客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        prompt_text: &str,
        model_name: &str,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt_text)
            .build()
            .map_err(|e| classify_openai_error(&e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| classify_openai_error(&e))?;

        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                BackendError::new(
                    BackendErrorKind::Timeout,
                    format!("请求超过 {} 秒未返回", timeout.as_secs()),
                )
            })?
            .map_err(|e| classify_openai_error(&e))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| BackendError::new(BackendErrorKind::Unknown, "LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

// 把 async-openai 的错误归入封闭的类别集合
fn classify_openai_error(err: &OpenAIError) -> BackendError {
    match err {
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            let lower = message.to_lowercase();
            let kind = if lower.contains("rate limit")
                || lower.contains("too many requests")
                || lower.contains("429")
            {
                BackendErrorKind::RateLimited
            } else if lower.contains("api key")
                || lower.contains("unauthorized")
                || lower.contains("authentication")
                || lower.contains("401")
                || lower.contains("403")
            {
                BackendErrorKind::AuthFailed
            } else if lower.contains("invalid")
                || lower.contains("bad request")
                || lower.contains("400")
            {
                BackendErrorKind::MalformedRequest
            } else {
                BackendErrorKind::Unknown
            };
            BackendError::new(kind, message)
        }
        OpenAIError::InvalidArgument(message) => {
            BackendError::new(BackendErrorKind::MalformedRequest, message.clone())
        }
        other => BackendError::new(BackendErrorKind::Unknown, other.to_string()),
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（总尝试次数 = max_retries + 1）
    pub max_retries: usize,
    /// 基础延迟，按 2^attempt 指数放大
    pub retry_delay: Duration,
    /// 频率限制错误的额外等待
    pub rate_limit_extra: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            rate_limit_extra: Duration::from_secs(config.rate_limit_extra_secs),
        }
    }

    /// 第 attempt 次失败后的等待时长
    pub fn backoff(&self, attempt: usize, kind: BackendErrorKind) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(16) as u32);
        let mut delay = self.retry_delay.saturating_mul(exp);
        if kind == BackendErrorKind::RateLimited {
            delay += self.rate_limit_extra;
        }
        delay
    }
}

/// 提取客户端
///
/// 除用于统计报告的计数器外，不在两次调用之间保留任何状态
pub struct ExtractionClient {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    timeout: Duration,
    attempts_total: AtomicU64,
    failures_total: AtomicU64,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &Config) -> Self {
        Self {
            backend,
            policy: RetryPolicy::from_config(config),
            timeout: Duration::from_secs(config.request_timeout_secs),
            attempts_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
        }
    }

    /// 执行一条补全请求
    ///
    /// 永不返回 Err：所有失败都归类进 CompletionResult::Failure
    pub async fn execute(&self, request: &CompletionRequest) -> CompletionResult {
        let chunk_ref = request.chunk_ref();
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..=self.policy.max_retries {
            self.attempts_total.fetch_add(1, Ordering::Relaxed);
            debug!(
                "📡 [{}] 调用补全后端 (尝试 {}/{})",
                chunk_ref,
                attempt + 1,
                self.policy.max_retries + 1
            );

            match self
                .backend
                .complete(
                    &request.prompt_text,
                    &request.model_name,
                    request.max_tokens,
                    request.temperature,
                    self.timeout,
                )
                .await
            {
                Ok(raw_completion_text) => {
                    debug!("✅ [{}] 补全成功", chunk_ref);
                    return CompletionResult::Success {
                        chunk: request.chunk.clone(),
                        sub_index: request.sub_index,
                        raw_completion_text,
                    };
                }
                Err(e) if !e.is_retriable() => {
                    warn!("❌ [{}] 后端拒绝请求，不再重试: {}", chunk_ref, e);
                    self.failures_total.fetch_add(1, Ordering::Relaxed);
                    return CompletionResult::Failure {
                        chunk: request.chunk.clone(),
                        sub_index: request.sub_index,
                        failure_kind: FailureKind::BackendRejected,
                        detail: e.message,
                    };
                }
                Err(e) => {
                    warn!(
                        "⚠️ [{}] 后端调用失败 (尝试 {}/{}): {}",
                        chunk_ref,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        e
                    );
                    if attempt < self.policy.max_retries {
                        let delay = self.policy.backoff(attempt, e.kind);
                        if !delay.is_zero() {
                            debug!("⏳ 等待 {:?} 后重试...", delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        self.failures_total.fetch_add(1, Ordering::Relaxed);
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "未知错误".to_string());
        warn!("❌ [{}] 重试耗尽，后端不可用: {}", chunk_ref, detail);

        CompletionResult::Failure {
            chunk: request.chunk.clone(),
            sub_index: request.sub_index,
            failure_kind: FailureKind::BackendUnavailable,
            detail,
        }
    }

    /// 累计尝试次数与失败次数
    pub fn stats(&self) -> (u64, u64) {
        (
            self.attempts_total.load(Ordering::Relaxed),
            self.failures_total.load(Ordering::Relaxed),
        )
    }
}

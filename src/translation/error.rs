//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。错误的分类（类型、严重程度、是否可恢复）
//! 由 [`crate::translation::retry::classifier`] 负责，这里只定义错误本身。

use std::fmt;

use thiserror::Error;

use crate::translation::pipeline::node::NodeId;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到限制 (rate limit): {0}")]
    RateLimited(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 批次处理错误
    #[error("批次处理错误: {0}")]
    BatchProcessingError(String),

    /// 翻译服务错误（翻译回调返回的错误通常落在这里）
    #[error("翻译服务错误: {0}")]
    TranslationServiceError(String),

    /// 超时错误
    #[error("操作超时 (timeout): {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误 (parse error): {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// 节点不存在
    #[error("节点不存在: {0}")]
    NodeNotFound(NodeId),

    /// 回复中缺少节点的译文
    #[error("translation not found in result (node {0})")]
    TranslationNotFound(NodeId),

    /// 操作被取消
    #[error("翻译已取消 (cancelled)")]
    Cancelled,

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 是否为取消错误
    ///
    /// 取消是唯一会中断整个翻译过程的错误，其余批次错误都会被转换为节点状态。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let suffix = format!(" (上下文: {})", context);

        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::NetworkError(ref mut msg)
            | TranslationError::RateLimited(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::CacheError(ref mut msg)
            | TranslationError::BatchProcessingError(ref mut msg)
            | TranslationError::TranslationServiceError(ref mut msg)
            | TranslationError::TimeoutError(ref mut msg)
            | TranslationError::ParseError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::ConcurrencyError(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => msg.push_str(&suffix),
            // 这些变体不携带消息
            TranslationError::NodeNotFound(_)
            | TranslationError::TranslationNotFound(_)
            | TranslationError::Cancelled => {}
        }

        self
    }
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::NetworkError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 创建翻译服务错误
    pub fn service_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::TranslationServiceError(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}

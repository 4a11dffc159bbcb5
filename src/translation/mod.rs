//! 翻译模块
//!
//! 基于节点的文档翻译引擎，采用清晰的模块化架构：
//! - **core**: 翻译回调、编排器、服务外观与进度通知
//! - **pipeline**: 节点模型与数据处理（存储、分批、编解码、上下文、过滤）
//! - **retry**: 错误分类与多轮重试调度
//! - **concurrency**: 工作池与性能指标
//! - **storage**: 翻译结果缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use doc_translator::translation::{translator_fn, TranslationConfig, TranslationService};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> doc_translator::translation::TranslationResult<()> {
//! let config = TranslationConfig::default_with_lang("zh");
//! let service = TranslationService::new(
//!     config,
//!     Arc::new(translator_fn(|text: String| async move { Ok(text) })),
//! )?;
//!
//! let output = service.translate_text("Hello world.", &CancellationToken::new()).await?;
//! assert!(output.summary.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod concurrency;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{
    translator_fn, FnTranslator, IdentityTranslator, Orchestrator, OrchestratorConfig,
    ProgressObserver, TracingProgressObserver, TranslationOutput, TranslationService,
    TranslationSummary, Translator,
};

pub use self::config::{constants, ConfigManager, TranslationConfig};

pub use error::{TranslationError, TranslationResult};

// ============================================================================
// 高级API导出 - 供扩展开发使用
// ============================================================================

pub use pipeline::{
    Batch, Batcher, ContextWindowBuilder, MarkedTextCodec, Node, NodeId, NodeMetadata,
    NodeStatus, NodeStore, TextFilter,
};

pub use retry::{ErrorClassifier, ErrorType, RetryConfig, RetryScheduler, RetryStrategy};

pub use self::concurrency::{MetricsSnapshot, PerformanceMetrics, PoolConfig, WorkerPool};

pub use storage::{CacheConfig, CacheStats, TranslationCache};

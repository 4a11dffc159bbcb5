//! # doc-translator
//!
//! 基于节点的文档翻译编排引擎：把文档拆成可翻译节点，按字符预算分批，
//! 通过标记文本把一个批次复用到一次翻译调用中，并用带上下文窗口的多轮重试恢复失败的节点。
//!
//! ## 模块组织
//!
//! - `translation` - 核心：节点模型、分批、编解码、重试、编排与服务外观
//! - `adapters` - 纯文本与 HTML 格式适配器
//! - `env` - 类型安全的环境变量
//! - `logging` - 日志初始化

pub mod adapters;
pub mod env;
pub mod logging;
pub mod translation;

// Re-export commonly used items for convenience
pub use adapters::{DocumentAdapter, PlainTextAdapter};
#[cfg(feature = "html")]
pub use adapters::HtmlAdapter;
pub use logging::init_logging;
pub use translation::{
    TranslationConfig, TranslationError, TranslationResult, TranslationService, Translator,
};

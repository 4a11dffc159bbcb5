//! 翻译系统核心模块
//!
//! 核心模块采用分层设计：
//!
//! - **回调层** (`translator.rs`): 翻译后端的唯一接口
//! - **编排层** (`orchestrator.rs`): 分批派发、解码回写、多轮重试与取消
//! - **服务层** (`service.rs`): 在编排外围组合预过滤、缓存、去重与工作池
//! - **进度** (`progress.rs`): 可选的进度观察者
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── TextFilter / Deduplicator (pipeline/filters.rs)
//!     ├── TranslationCache (storage/cache.rs)
//!     ├── WorkerPool (concurrency/pool.rs)
//!     └── Orchestrator (orchestrator.rs)
//!             ├── Batcher / MarkedTextCodec (pipeline)
//!             └── RetryScheduler (retry/scheduler.rs)
//! ```

pub mod orchestrator;
pub mod progress;
pub mod service;
pub mod translator;

pub use orchestrator::{Orchestrator, OrchestratorConfig, TranslationSummary};
pub use progress::{ProgressObserver, TracingProgressObserver};
pub use service::{TranslationOutput, TranslationService};
pub use translator::{translator_fn, FnTranslator, IdentityTranslator, Translator};

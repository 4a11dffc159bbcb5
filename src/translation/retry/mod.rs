//! 重试模块
//!
//! 错误分类与基于上下文窗口的多轮重试调度。

pub mod classifier;
pub mod scheduler;

pub use classifier::{ClassifiedError, ErrorClassifier, ErrorSeverity, ErrorStats, ErrorType};
pub use scheduler::{
    ProcessedSet, RetryConfig, RetryGroup, RetryOutcome, RetryRecord, RetryScheduler,
    RetryStrategy,
};

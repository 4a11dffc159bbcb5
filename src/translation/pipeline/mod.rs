//! 翻译管道模块
//!
//! 节点模型与围绕它的纯数据处理：存储、分批、标记文本编解码、
//! 重试上下文窗口、预过滤与去重。

pub mod batch;
pub mod codec;
pub mod context;
pub mod filters;
pub mod node;
pub mod store;

// 重新导出主要类型
pub use batch::{Batch, Batcher};
pub use codec::{DecodedBatch, MarkedTextCodec};
pub use context::{ContextWindowBuilder, SemanticHints, TextRole, TranslationContext};
pub use filters::{DedupPlan, Deduplicator, TextFilter, TextPriority};
pub use node::{Node, NodeId, NodeMetadata, NodeStatus};
pub use store::{NodeStore, StatusCounts};

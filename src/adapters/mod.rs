//! 格式适配器
//!
//! 适配器把具体格式的文档拆成节点写入 [`NodeStore`]，翻译完成后再读取节点的最终状态，
//! 把译文回写到自己的文档结构中。核心流程不了解任何文档格式。
//!
//! - `text`: 按空行拆分段落的纯文本适配器
//! - `html`: 基于 html5ever 的 HTML 适配器（`html` 特性）

use crate::translation::error::TranslationResult;
use crate::translation::pipeline::store::NodeStore;

#[cfg(feature = "html")]
pub mod html;
pub mod text;

#[cfg(feature = "html")]
pub use html::HtmlAdapter;
pub use text::PlainTextAdapter;

/// 格式适配器接口
pub trait DocumentAdapter {
    /// 用于进度通知的文档名
    fn name(&self) -> &str;

    /// 写入存储的节点数量
    fn node_count(&self) -> usize;

    /// 用存储中的最终结果重建文档；未成功的节点保留原文
    fn render(&self, store: &NodeStore) -> TranslationResult<String>;
}

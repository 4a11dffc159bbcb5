//! 翻译节点
//!
//! 节点是可翻译文本的最小单位。格式适配器在解析文档时创建节点（状态为
//! `Pending`），翻译过程中只能通过 [`NodeStore::update`](super::store::NodeStore::update)
//! 修改，翻译结束后由适配器读取最终状态并写回原始文档树。
//!
//! ## 状态流转
//!
//! ```text
//! Pending ──▶ Success
//!    │
//!    └──────▶ Failed ──▶ Retrying ──▶ Success | Failed
//!
//! Skipped（预过滤或去重时设置）
//! ```

use serde::{Deserialize, Serialize};

/// 节点标识符，在同一个 `NodeStore` 内唯一
pub type NodeId = u64;

/// 节点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// 等待翻译
    Pending,
    /// 正在重试
    Retrying,
    /// 翻译成功
    Success,
    /// 翻译失败
    Failed,
    /// 跳过（无需翻译）
    Skipped,
}

impl NodeStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Success | NodeStatus::Failed | NodeStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Retrying => "retrying",
            NodeStatus::Success => "success",
            NodeStatus::Failed => "failed",
            NodeStatus::Skipped => "skipped",
        }
    }
}

/// 适配器附加的回写信息
///
/// 由格式适配器写入、由同一个适配器读取，核心流程从不检查其内容。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeMetadata {
    /// 无附加信息
    #[default]
    None,
    /// 纯文本段落，记录段落前后的空白
    TextBlock { leading: String, trailing: String },
    /// DOM 文本节点，`slot` 指向适配器内部保存的节点句柄
    DomText {
        slot: usize,
        leading: String,
        trailing: String,
    },
    /// DOM 元素属性
    DomAttribute { slot: usize, attribute: String },
}

/// 可翻译文本节点
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// 节点唯一标识
    pub id: NodeId,
    /// 产生该节点的文档块引用
    pub block_id: String,
    /// 原文
    pub original_text: String,
    /// 译文，成功之前为空
    pub translated_text: String,
    /// 当前状态
    pub status: NodeStatus,
    /// 结构路径，例如 `html/body/ul/li[2]`
    pub path: String,
    /// 前文上下文
    pub context_before: Option<String>,
    /// 后文上下文
    pub context_after: Option<String>,
    /// 适配器回写信息
    pub metadata: NodeMetadata,
    /// 最近一次错误
    pub last_error: Option<String>,
    /// 重试次数
    pub retry_count: u32,
    /// 若该节点由更大的节点切分而来，记录父节点
    pub parent_id: Option<NodeId>,
    /// 在父节点中的切片序号
    pub split_index: Option<usize>,
}

impl Node {
    /// 创建新的待翻译节点
    pub fn new(id: NodeId, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            block_id: block_id.into(),
            original_text: text.into(),
            translated_text: String::new(),
            status: NodeStatus::Pending,
            path: String::new(),
            context_before: None,
            context_after: None,
            metadata: NodeMetadata::None,
            last_error: None,
            retry_count: 0,
            parent_id: None,
            split_index: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_context(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }

    /// 标记为某个父节点的切片
    pub fn as_split_of(mut self, parent_id: NodeId, split_index: usize) -> Self {
        self.parent_id = Some(parent_id);
        self.split_index = Some(split_index);
        self
    }

    /// 原文字符数（批次大小按字符计算）
    pub fn char_count(&self) -> usize {
        self.original_text.chars().count()
    }

    /// 结构路径的最后一段标签名，例如 `li[2]` 得到 `li`
    pub fn tag(&self) -> Option<&str> {
        let last = self.path.rsplit('/').next()?;
        let tag = last.split('[').next().unwrap_or(last);
        if tag.is_empty() {
            None
        } else {
            Some(tag)
        }
    }

    /// 标记翻译成功
    pub fn mark_success(&mut self, translated: impl Into<String>) {
        self.translated_text = translated.into();
        self.status = NodeStatus::Success;
        self.last_error = None;
    }

    /// 标记翻译失败，译文被清空以保持 “有译文即成功” 的不变式
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.translated_text.clear();
        self.status = NodeStatus::Failed;
        self.last_error = Some(error.into());
    }

    /// 进入重试
    pub fn mark_retrying(&mut self) {
        self.translated_text.clear();
        self.status = NodeStatus::Retrying;
        self.retry_count += 1;
    }

    pub fn mark_skipped(&mut self) {
        self.translated_text.clear();
        self.status = NodeStatus::Skipped;
    }

    /// 检查节点不变式：非空译文意味着成功状态
    pub fn is_consistent(&self) -> bool {
        self.translated_text.is_empty() || self.status == NodeStatus::Success
    }
}

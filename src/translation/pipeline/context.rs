//! 重试上下文窗口
//!
//! 重试失败节点时，把它前后各 `K` 个相邻节点（按文档顺序）一起发送，
//! 让翻译回调看到周围的文本。多个失败节点的窗口重叠时自动去重，
//! 输出顺序始终是原始文档顺序的子序列，与失败节点的输入顺序无关。

use std::collections::HashSet;

use serde::Serialize;

use crate::translation::config::constants;
use crate::translation::pipeline::node::{Node, NodeId};
use crate::translation::pipeline::store::NodeStore;

/// 节点在文档中的语义角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Heading,
    Paragraph,
    ListItem,
    TableCell,
    Link,
    Button,
    Caption,
    Generic,
}

/// 语义提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticHints {
    pub role: TextRole,
    /// 标题级别（h1-h6）
    pub heading_level: Option<u8>,
    pub in_list: bool,
    pub in_table: bool,
}

impl SemanticHints {
    /// 根据结构路径推断语义提示
    pub fn from_path(path: &str) -> Self {
        let tags: Vec<&str> = path
            .split('/')
            .map(|segment| segment.split('[').next().unwrap_or(segment))
            .filter(|tag| !tag.is_empty())
            .collect();

        let in_list = tags.iter().any(|t| matches!(*t, "ul" | "ol" | "li" | "dl"));
        let in_table = tags
            .iter()
            .any(|t| matches!(*t, "table" | "tr" | "td" | "th"));

        let mut heading_level = None;
        let mut role = TextRole::Generic;

        // 最近的祖先决定角色
        for tag in tags.iter().rev() {
            let found = match *tag {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    heading_level = tag[1..].parse().ok();
                    Some(TextRole::Heading)
                }
                "title" => Some(TextRole::Heading),
                "p" | "blockquote" => Some(TextRole::Paragraph),
                "li" | "dt" | "dd" => Some(TextRole::ListItem),
                "td" | "th" => Some(TextRole::TableCell),
                "a" => Some(TextRole::Link),
                "button" => Some(TextRole::Button),
                "caption" | "figcaption" => Some(TextRole::Caption),
                _ => None,
            };
            if let Some(found) = found {
                role = found;
                break;
            }
        }

        Self {
            role,
            heading_level,
            in_list,
            in_table,
        }
    }
}

/// 单次重试使用的上下文
///
/// 只在一次重试中有效，不会被持久化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationContext {
    /// 之前的相邻文本（文档顺序）
    pub before: Vec<String>,
    /// 之后的相邻文本（文档顺序）
    pub after: Vec<String>,
    /// 节点所在的标签
    pub tag: Option<String>,
    /// 节点结构路径
    pub path: String,
    pub hints: SemanticHints,
}

impl TranslationContext {
    /// 用于日志的简短描述
    pub fn summary(&self) -> String {
        format!(
            "{:?} tag={} before={} after={}",
            self.hints.role,
            self.tag.as_deref().unwrap_or("-"),
            self.before.len(),
            self.after.len()
        )
    }
}

/// 上下文窗口构建器
#[derive(Debug, Clone, Copy)]
pub struct ContextWindowBuilder {
    distance: usize,
    snippet_chars: usize,
}

impl ContextWindowBuilder {
    pub fn new(distance: usize) -> Self {
        Self {
            distance,
            snippet_chars: constants::DEFAULT_CONTEXT_SNIPPET_CHARS,
        }
    }

    /// 设置单条上下文片段的最大字符数
    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    /// 把失败节点扩展为带上下文的窗口
    ///
    /// 返回的节点按文档顺序排列且不重复；不在存储中的标识会被忽略。
    pub fn expand(&self, store: &NodeStore, failed: &[NodeId]) -> Vec<Node> {
        let all = store.get_all();
        if all.is_empty() || failed.is_empty() {
            return Vec::new();
        }

        let last = all.len() - 1;
        let mut window: HashSet<NodeId> = HashSet::new();

        for id in failed {
            let Some(position) = store.position(*id) else {
                tracing::debug!("失败节点 {} 不在存储中，跳过", id);
                continue;
            };
            let start = position.saturating_sub(self.distance);
            let end = (position + self.distance).min(last);
            window.extend(all[start..=end].iter().map(|node| node.id));
        }

        all.into_iter()
            .filter(|node| window.contains(&node.id))
            .collect()
    }

    /// 为单个节点构建重试上下文
    pub fn build_context(&self, store: &NodeStore, id: NodeId) -> Option<TranslationContext> {
        let node = store.get(id)?;
        let position = store.position(id)?;
        let all = store.get_all();

        let start = position.saturating_sub(self.distance);
        let end = (position + self.distance + 1).min(all.len());

        let before = all[start..position]
            .iter()
            .map(|n| truncate_chars(&n.original_text, self.snippet_chars))
            .collect();
        let after = all[position + 1..end]
            .iter()
            .map(|n| truncate_chars(&n.original_text, self.snippet_chars))
            .collect();

        Some(TranslationContext {
            before,
            after,
            tag: node.tag().map(str::to_string),
            path: node.path.clone(),
            hints: SemanticHints::from_path(&node.path),
        })
    }
}

/// 按字符截断并去除首尾空白
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_index, _)) => trimmed[..byte_index].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

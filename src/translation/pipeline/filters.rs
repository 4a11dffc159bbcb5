//! 文本预过滤与去重
//!
//! 在派发之前丢弃无需翻译的节点（空文本、过短、纯标点、纯数字），
//! 并把原文相同的节点合并为一个代表节点，其余节点在翻译结束后复用代表的结果。

use std::collections::HashMap;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;

use crate::translation::config::constants;
use crate::translation::pipeline::node::{Node, NodeId};

/// 文本优先级，去重时保留优先级最高的节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl TextPriority {
    /// 根据节点所在标签推断优先级：标题 > 段落 > 通用容器
    pub fn for_node(node: &Node) -> Self {
        match node.tag() {
            Some("title" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => TextPriority::Critical,
            Some("p" | "li" | "blockquote" | "td" | "th" | "caption" | "figcaption") => {
                TextPriority::High
            }
            Some("a" | "button" | "label" | "span" | "strong" | "em") => TextPriority::Normal,
            _ => TextPriority::Low,
        }
    }
}

/// 文本过滤器
pub struct TextFilter {
    min_length: usize,
    digits_regex: OnceLock<Option<Regex>>,
}

impl TextFilter {
    pub fn new() -> Self {
        Self::with_min_length(constants::MIN_TEXT_LENGTH)
    }

    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            digits_regex: OnceLock::new(),
        }
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return false;
        }

        if trimmed.chars().count() < self.min_length {
            return false;
        }

        if self.is_pure_punctuation(trimmed) {
            return false;
        }

        !self.is_pure_digits(trimmed)
    }

    /// 纯标点或符号（含空白）
    fn is_pure_punctuation(&self, text: &str) -> bool {
        text.chars()
            .all(|c| c.is_whitespace() || c.is_ascii_punctuation() || is_symbol(c))
    }

    /// 纯数字，允许常见的数字分隔符
    fn is_pure_digits(&self, text: &str) -> bool {
        let regex = self
            .digits_regex
            .get_or_init(|| Regex::new(r"^[+-]?[\d\s.,:/%-]+$").ok());
        match regex {
            Some(regex) => regex.is_match(text) && text.chars().any(|c| c.is_ascii_digit()),
            None => text.chars().all(|c| c.is_ascii_digit()),
        }
    }

    /// 拆分出需要翻译的节点与应跳过的节点标识
    ///
    /// 节点较多时使用 rayon 并行判断，结果保持原有顺序。
    pub fn partition(&self, nodes: Vec<Node>) -> (Vec<Node>, Vec<NodeId>) {
        let keep: Vec<bool> = if nodes.len() >= constants::PARALLEL_FILTER_THRESHOLD {
            nodes
                .par_iter()
                .map(|node| self.should_translate(&node.original_text))
                .collect()
        } else {
            nodes
                .iter()
                .map(|node| self.should_translate(&node.original_text))
                .collect()
        };

        let mut translatable = Vec::with_capacity(nodes.len());
        let mut skipped = Vec::new();
        for (node, keep) in nodes.into_iter().zip(keep) {
            if keep {
                translatable.push(node);
            } else {
                skipped.push(node.id);
            }
        }
        (translatable, skipped)
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '•' | '·' | '…' | '—' | '–' | '▶' | '▲' | '▼' | '◀' | '→' | '←' | '©' | '®' | '™'
            | '«' | '»' | '“' | '”' | '‘' | '’' | '。' | '，' | '、' | '！' | '？' | '：' | '；'
    )
}

/// 去重计划
///
/// `representatives` 按文档顺序列出需要真正派发的节点；
/// `followers` 记录每个重复节点复用哪个代表节点的结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupPlan {
    pub representatives: Vec<Node>,
    pub followers: HashMap<NodeId, NodeId>,
}

impl DedupPlan {
    pub fn duplicate_count(&self) -> usize {
        self.followers.len()
    }
}

/// 原文去重器
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    /// 合并原文（去除首尾空白后）相同的节点
    ///
    /// 每组保留优先级最高的节点，优先级相同时保留文档中最靠前的节点。
    pub fn plan(&self, nodes: Vec<Node>) -> DedupPlan {
        let mut best: HashMap<String, (TextPriority, usize)> = HashMap::new();

        for (position, node) in nodes.iter().enumerate() {
            let key = node.original_text.trim().to_string();
            let priority = TextPriority::for_node(node);
            best.entry(key)
                .and_modify(|entry| {
                    if priority > entry.0 {
                        *entry = (priority, position);
                    }
                })
                .or_insert((priority, position));
        }

        let representative_ids: HashMap<String, NodeId> = best
            .iter()
            .map(|(key, (_, position))| (key.clone(), nodes[*position].id))
            .collect();

        let mut plan = DedupPlan::default();
        for node in nodes {
            let key = node.original_text.trim();
            match representative_ids.get(key) {
                Some(&rep) if rep != node.id => {
                    plan.followers.insert(node.id, rep);
                }
                _ => plan.representatives.push(node),
            }
        }

        if !plan.followers.is_empty() {
            tracing::debug!(
                "去重: {} 个代表节点，{} 个重复节点",
                plan.representatives.len(),
                plan.followers.len()
            );
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_translate() {
        let filter = TextFilter::new();
        assert!(filter.should_translate("Hello world"));
        assert!(filter.should_translate("  Hi  "));
        assert!(!filter.should_translate(""));
        assert!(!filter.should_translate("   \n"));
        assert!(!filter.should_translate("a"));
        assert!(!filter.should_translate("...!?"));
        assert!(!filter.should_translate("• —"));
        assert!(!filter.should_translate("12345"));
        assert!(!filter.should_translate("3.14, 2,718"));
        assert!(!filter.should_translate("2024-01-01"));
        assert!(filter.should_translate("Chapter 12"));
    }

    #[test]
    fn test_partition_keeps_order() {
        let nodes = vec![
            Node::new(1, "b", "Hello"),
            Node::new(2, "b", "42"),
            Node::new(3, "b", "World"),
            Node::new(4, "b", ""),
        ];
        let (keep, skipped) = TextFilter::new().partition(nodes);
        assert_eq!(keep.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(skipped, vec![2, 4]);
    }

    #[test]
    fn test_partition_parallel_path() {
        let nodes: Vec<Node> = (1..=600)
            .map(|i| {
                let text = if i % 2 == 0 { "Text".to_string() } else { i.to_string() };
                Node::new(i, "b", text)
            })
            .collect();
        let (keep, skipped) = TextFilter::new().partition(nodes);
        assert_eq!(keep.len(), 300);
        assert_eq!(skipped.len(), 300);
        assert!(keep.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_dedup_prefers_heading() {
        let nodes = vec![
            Node::new(1, "b", "Welcome").with_path("html/body/div"),
            Node::new(2, "b", "Welcome").with_path("html/body/h1"),
            Node::new(3, "b", "Other").with_path("html/body/p"),
            Node::new(4, "b", " Welcome ").with_path("html/body/p"),
        ];
        let plan = Deduplicator.plan(nodes);

        let reps: Vec<NodeId> = plan.representatives.iter().map(|n| n.id).collect();
        assert_eq!(reps, vec![2, 3]);
        assert_eq!(plan.followers.get(&1), Some(&2));
        assert_eq!(plan.followers.get(&4), Some(&2));
        assert_eq!(plan.duplicate_count(), 2);
    }

    #[test]
    fn test_dedup_tie_keeps_first() {
        let nodes = vec![Node::new(1, "b", "Same"), Node::new(2, "b", "Same")];
        let plan = Deduplicator.plan(nodes);
        assert_eq!(plan.representatives.len(), 1);
        assert_eq!(plan.representatives[0].id, 1);
        assert_eq!(plan.followers.get(&2), Some(&1));
    }

    #[test]
    fn test_priority_for_node() {
        let heading = Node::new(1, "b", "x").with_path("html/body/h3");
        let para = Node::new(2, "b", "x").with_path("html/body/p[1]");
        let div = Node::new(3, "b", "x").with_path("html/body/div");
        assert!(TextPriority::for_node(&heading) > TextPriority::for_node(&para));
        assert!(TextPriority::for_node(&para) > TextPriority::for_node(&div));
    }
}

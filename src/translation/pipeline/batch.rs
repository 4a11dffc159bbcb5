//! 翻译批次分组模块
//!
//! 将按文档顺序排列的节点贪心地打包成不超过 `max_batch_size`（字符数）的批次，
//! 以减少翻译调用次数。
//!
//! ## 分组规则
//!
//! 1. 单个节点超过上限时，先提交当前累积的批次，再把该节点单独作为一个批次
//! 2. 加入节点会超出上限且当前批次非空时，先提交当前批次
//! 3. 批次内部与批次之间都保持原始顺序，从不为了填充率重新排序
//!
//! 批次只是临时值，每一轮编排都会重新计算；超长文本的切分属于适配器的职责。
//!
//! ```rust
//! use doc_translator::translation::pipeline::{Batcher, Node};
//!
//! let nodes = vec![Node::new(1, "b", "Hello "), Node::new(2, "b", "world")];
//! let batches = Batcher::new(1000).group(nodes);
//! assert_eq!(batches.len(), 1);
//! assert_eq!(batches[0].size, 11);
//! ```

use crate::translation::pipeline::node::{Node, NodeId};

/// 翻译批次
///
/// 按文档顺序排列的节点快照，以及这些节点原文的累计字符数。
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 批次序号（在本次分组结果中的位置）
    pub index: usize,
    /// 包含的节点
    pub nodes: Vec<Node>,
    /// 原文累计字符数
    pub size: usize,
}

impl Batch {
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 是否为单个超长节点组成的批次
    pub fn is_oversized(&self, max_batch_size: usize) -> bool {
        self.nodes.len() == 1 && self.size > max_batch_size
    }
}

/// 贪心批次分组器
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    max_batch_size: usize,
}

impl Batcher {
    /// 创建分组器，`max_batch_size` 为 0 时按 1 处理
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// 按顺序将节点分组
    pub fn group(&self, nodes: Vec<Node>) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut current_size = 0usize;

        for node in nodes {
            let node_size = node.char_count();

            if node_size > self.max_batch_size {
                // 超长节点单独成批
                Self::flush(&mut batches, &mut current, &mut current_size);
                batches.push(Batch {
                    index: batches.len(),
                    nodes: vec![node],
                    size: node_size,
                });
                continue;
            }

            if current_size + node_size > self.max_batch_size && !current.is_empty() {
                Self::flush(&mut batches, &mut current, &mut current_size);
            }

            current_size += node_size;
            current.push(node);
        }

        Self::flush(&mut batches, &mut current, &mut current_size);

        tracing::debug!(
            "分组完成: {} 个批次，上限 {} 字符",
            batches.len(),
            self.max_batch_size
        );

        batches
    }

    fn flush(batches: &mut Vec<Batch>, current: &mut Vec<Node>, current_size: &mut usize) {
        if current.is_empty() {
            return;
        }
        batches.push(Batch {
            index: batches.len(),
            nodes: std::mem::take(current),
            size: std::mem::take(current_size),
        });
    }
}

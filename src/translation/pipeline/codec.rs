//! 标记文本编解码
//!
//! 把一个批次的多个节点复用到一次翻译调用中，再把回复拆回各个节点。
//! 这是核心流程与翻译回调之间唯一的协议约定：
//!
//! ```text
//! @@NODE_START_<id>@@
//! <原文>
//! @@NODE_END_<id>@@
//!
//! @@NODE_START_<id2>@@
//! ...
//! @@NODE_END_<id2>@@
//! ```
//!
//! 相邻节点块之间恰好一个空行，`<id>` 为不带前导零的十进制标识。
//! 解码容忍节点块乱序，但不容忍残缺的标记：无法闭合的节点会被报告为缺失。

use std::collections::{HashMap, HashSet};

use crate::translation::pipeline::node::{Node, NodeId};

pub const NODE_START_PREFIX: &str = "@@NODE_START_";
pub const NODE_END_PREFIX: &str = "@@NODE_END_";
pub const MARKER_SUFFIX: &str = "@@";

/// 解码结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    /// 找到译文的节点，按批次顺序排列
    pub translated: Vec<(NodeId, String)>,
    /// 回复中没有闭合标记的节点，按批次顺序排列
    pub missing: Vec<NodeId>,
}

impl DecodedBatch {
    pub fn translation_for(&self, id: NodeId) -> Option<&str> {
        self.translated
            .iter()
            .find(|(node_id, _)| *node_id == id)
            .map(|(_, text)| text.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 标记文本编解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkedTextCodec;

impl MarkedTextCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn start_marker(id: NodeId) -> String {
        format!("{}{}{}", NODE_START_PREFIX, id, MARKER_SUFFIX)
    }

    pub fn end_marker(id: NodeId) -> String {
        format!("{}{}{}", NODE_END_PREFIX, id, MARKER_SUFFIX)
    }

    /// 按批次顺序编码节点原文
    pub fn encode(&self, nodes: &[Node]) -> String {
        let mut out = String::with_capacity(
            nodes
                .iter()
                .map(|node| node.original_text.len() + 48)
                .sum(),
        );

        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&Self::start_marker(node.id));
            out.push('\n');
            out.push_str(&node.original_text);
            out.push('\n');
            out.push_str(&Self::end_marker(node.id));
        }

        out
    }

    /// 解码翻译回复
    ///
    /// 闭合标记之间的行以换行拼接并去除首尾空白，然后补回原文的首尾空白；
    /// 原文全部是空白时直接沿用原文。只接受 `nodes` 中出现的标识。
    pub fn decode(&self, reply: &str, nodes: &[Node]) -> DecodedBatch {
        let expected: HashSet<NodeId> = nodes.iter().map(|node| node.id).collect();
        let mut captured: HashMap<NodeId, String> = HashMap::new();
        let mut current: Option<(NodeId, Vec<&str>)> = None;

        // 只按 '\n' 切分，内容行里的 '\r' 原样保留
        for line in reply.split('\n') {
            let marker = line.trim();

            if let Some(id) = parse_marker(marker, NODE_START_PREFIX) {
                if let Some((open_id, _)) = current.take() {
                    tracing::debug!("节点 {} 的标记未闭合，被节点 {} 打断", open_id, id);
                }
                current = Some((id, Vec::new()));
                continue;
            }

            if let Some(id) = parse_marker(marker, NODE_END_PREFIX) {
                match current.take() {
                    Some((open_id, lines)) if open_id == id => {
                        if expected.contains(&id) {
                            captured
                                .entry(id)
                                .or_insert_with(|| lines.join("\n").trim().to_string());
                        } else {
                            tracing::debug!("忽略回复中的未知节点 {}", id);
                        }
                    }
                    // 不匹配的结束标记：丢弃当前捕获
                    _ => {}
                }
                continue;
            }

            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        let mut decoded = DecodedBatch::default();
        for node in nodes {
            match captured.remove(&node.id) {
                Some(text) => decoded
                    .translated
                    .push((node.id, restore_padding(&node.original_text, &text))),
                None => decoded.missing.push(node.id),
            }
        }
        decoded
    }
}

/// 解析形如 `@@NODE_START_12@@` 的标记，拒绝前导零与非数字
fn parse_marker(line: &str, prefix: &str) -> Option<NodeId> {
    let digits = line.strip_prefix(prefix)?.strip_suffix(MARKER_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// 把 `translated` 套上 `original` 的首尾空白
pub fn restore_padding(original: &str, translated: &str) -> String {
    if original.trim().is_empty() {
        return original.to_string();
    }
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];
    format!("{}{}{}", leading, translated, trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId, text: &str) -> Node {
        Node::new(id, "b", text)
    }

    #[test]
    fn test_encode_wire_format() {
        let nodes = vec![node(1, "Hello "), node(2, "world")];
        assert_eq!(
            MarkedTextCodec.encode(&nodes),
            "@@NODE_START_1@@\nHello \n@@NODE_END_1@@\n\n@@NODE_START_2@@\nworld\n@@NODE_END_2@@"
        );
    }

    #[test]
    fn test_identity_round_trip() {
        let nodes = vec![
            node(1, "Hello "),
            node(2, "world"),
            node(3, ""),
            node(4, "line one\n\nline three"),
            node(5, "  \n "),
            node(6, "\n padded \t"),
            node(7, "line one\r\nline two"),
            node(8, "crlf tail\r\n"),
        ];
        let codec = MarkedTextCodec;
        let decoded = codec.decode(&codec.encode(&nodes), &nodes);

        assert!(decoded.is_complete());
        for n in &nodes {
            assert_eq!(decoded.translation_for(n.id), Some(n.original_text.as_str()));
        }
    }

    #[test]
    fn test_decode_tolerates_reordering() {
        let nodes = vec![node(1, "a"), node(2, "b")];
        let reply = "@@NODE_START_2@@\nB\n@@NODE_END_2@@\n\n@@NODE_START_1@@\nA\n@@NODE_END_1@@";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.translated, vec![(1, "A".to_string()), (2, "B".to_string())]);
    }

    #[test]
    fn test_decode_reports_missing_nodes() {
        let nodes = vec![node(1, "a"), node(2, "b"), node(3, "c")];
        // 节点 2 没有结束标记，节点 3 完全缺失
        let reply = "@@NODE_START_1@@\nA\n@@NODE_END_1@@\n\n@@NODE_START_2@@\nB\n";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.translated, vec![(1, "A".to_string())]);
        assert_eq!(decoded.missing, vec![2, 3]);
    }

    #[test]
    fn test_decode_rejects_malformed_markers() {
        let nodes = vec![node(1, "a")];
        let reply = "@@NODE_START_1@@\nA\n@@NODE_END_01@@";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.missing, vec![1]);

        let reply = "@@NODE_START_1@\nA\n@@NODE_END_1@@";
        assert_eq!(MarkedTextCodec.decode(reply, &nodes).missing, vec![1]);
    }

    #[test]
    fn test_decode_mismatched_end_marker() {
        let nodes = vec![node(1, "a"), node(2, "b")];
        let reply = "@@NODE_START_1@@\nA\n@@NODE_END_2@@";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.missing, vec![1, 2]);
    }

    #[test]
    fn test_decode_ignores_unknown_ids() {
        let nodes = vec![node(1, "a")];
        let reply = "@@NODE_START_9@@\nX\n@@NODE_END_9@@\n\n@@NODE_START_1@@\nA\n@@NODE_END_1@@";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.translated, vec![(1, "A".to_string())]);
    }

    #[test]
    fn test_decode_trims_then_restores_padding() {
        let nodes = vec![node(1, "  Hello  ")];
        let reply = "@@NODE_START_1@@\n   Bonjour   \n@@NODE_END_1@@";
        let decoded = MarkedTextCodec.decode(reply, &nodes);
        assert_eq!(decoded.translation_for(1), Some("  Bonjour  "));
    }
}

//! 翻译管道集成测试
//!
//! 测试从节点存储到译文回写的端到端流程

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use doc_translator::translation::core::orchestrator::{Orchestrator, OrchestratorConfig};
use doc_translator::translation::core::service::TranslationService;
use doc_translator::translation::pipeline::batch::Batcher;
use doc_translator::translation::pipeline::node::{Node, NodeStatus};
use doc_translator::translation::retry::{RetryConfig, RetryStrategy};
use doc_translator::translation::TranslationConfig;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{
    immediate_config, paragraphs, payload_ids, store_with, RecordingObserver, ScriptedTranslator,
    Step,
};

/// 回调收到的文本与约定的标记格式逐字节一致，译文补回原文首尾空白
#[tokio::test]
async fn test_wire_format_and_padding() {
    let store = store_with(&["Hello ", "world"]);
    let translator = ScriptedTranslator::new(vec![Step::Prefix("")]);
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        translator.clone(),
        OrchestratorConfig::default(),
    );

    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        translator.payloads()[0],
        "@@NODE_START_1@@\nHello \n@@NODE_END_1@@\n\n@@NODE_START_2@@\nworld\n@@NODE_END_2@@"
    );
    assert_eq!(store.get(1).unwrap().translated_text, "Hello ");
    assert_eq!(store.get(2).unwrap().translated_text, "world");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.batches_dispatched, 1);
}

/// 十个节点中 3 和 7 缺失：重试只发送 [2,3,4] 与 [6,7,8]，邻居的译文不被覆盖
#[tokio::test]
async fn test_retry_with_context_window() {
    let texts = paragraphs(10);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let store = store_with(&refs);

    let translator = ScriptedTranslator::new(vec![
        Step::Drop("first:", vec![3, 7]),
        Step::Prefix("retry:"),
    ]);
    let config = TranslationConfig {
        context_distance: 1,
        ..immediate_config()
    };
    let service = TranslationService::new(config, translator.clone()).unwrap();

    let summary = service
        .translate_store(Arc::clone(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(translator.calls(), 2);
    assert_eq!(payload_ids(&translator.payloads()[1]), vec![2, 3, 4, 6, 7, 8]);
    assert_eq!(summary.succeeded, 10);
    assert_eq!(summary.retry_rounds, 1);

    let node2 = store.get(2).unwrap();
    let node3 = store.get(3).unwrap();
    assert_eq!(node2.translated_text, format!("first:{}", texts[1]));
    assert_eq!(node3.translated_text, format!("retry:{}", texts[2]));
    assert_eq!(node3.retry_count, 1);
}

/// 分批不超过字符上限，超长节点单独成批，顺序保持文档顺序
#[test]
fn test_batch_size_bound() {
    let lengths = [5usize, 30, 12, 80, 1, 49, 50, 7, 120, 3, 3, 44];
    let nodes: Vec<Node> = lengths
        .iter()
        .enumerate()
        .map(|(i, len)| Node::new(i as u64 + 1, "b", "x".repeat(*len)))
        .collect();

    let batches = Batcher::new(50).group(nodes);

    let mut seen = Vec::new();
    for batch in &batches {
        assert!(batch.size <= 50 || batch.len() == 1, "batch {:?} too large", batch.ids());
        assert_eq!(batch.size, batch.nodes.iter().map(|n| n.char_count()).sum::<usize>());
        seen.extend(batch.ids());
    }
    assert_eq!(seen, (1..=lengths.len() as u64).collect::<Vec<_>>());
}

/// 纯文本端到端：段落与空行结构保持不变
#[tokio::test]
async fn test_translate_text_end_to_end() {
    let translator = ScriptedTranslator::new(vec![Step::Prefix("zh:")]);
    let service = TranslationService::new(immediate_config(), translator.clone()).unwrap();

    let output = service
        .translate_text(
            "First paragraph here.\n\n  Second one\nwith two lines.\n\n\n42\n",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        output.text,
        "zh:First paragraph here.\n\n  zh:Second one\nzh:with two lines.\n\n\n42\n"
    );
    assert_eq!(output.summary.succeeded, 2);
    assert_eq!(output.summary.skipped, 1);
    assert_eq!(translator.calls(), 1);
}

#[cfg(feature = "html")]
#[tokio::test]
async fn test_translate_html_end_to_end() {
    let translator = ScriptedTranslator::new(vec![Step::Prefix("zh:")]);
    let service = TranslationService::new(immediate_config(), translator).unwrap();

    let html = r#"<html><body><h1>Welcome home</h1><ul><li>First item</li><li title="Tooltip text">Second item</li></ul><pre>let x = 1;</pre></body></html>"#;
    let output = service
        .translate_html(html, &CancellationToken::new())
        .await
        .unwrap();

    assert!(output.text.contains("<h1>zh:Welcome home</h1>"));
    assert!(output.text.contains("<li>zh:First item</li>"));
    assert!(output.text.contains(r#"title="zh:Tooltip text""#));
    assert!(output.text.contains("<pre>let x = 1;</pre>"));
    assert!(output.summary.is_complete());
}

/// 重复原文只派发一次，重复节点复用代表节点的译文
#[tokio::test]
async fn test_duplicates_dispatched_once() {
    let store = store_with(&["Read more", "Unique text", "Read more"]);
    let translator = ScriptedTranslator::new(vec![Step::Prefix("t:")]);
    let service = TranslationService::new(immediate_config(), translator.clone()).unwrap();

    let summary = service
        .translate_store(Arc::clone(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(payload_ids(&translator.payloads()[0]), vec![1, 2]);
    assert_eq!(store.get(3).unwrap().translated_text, "t:Read more");
    assert_eq!(store.get(3).unwrap().status, NodeStatus::Success);
    assert_eq!(summary.succeeded, 3);
}

/// 工作池并行派发：每个批次的结果回到正确的节点
#[tokio::test]
async fn test_parallel_dispatch_through_pool() {
    let texts = paragraphs(12);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let store = store_with(&refs);

    let translator = ScriptedTranslator::new(vec![Step::Prefix("p:")]);
    let config = TranslationConfig {
        parallel_enabled: true,
        worker_count: 3,
        queue_backlog: 4,
        max_batch_size: 60,
        ..immediate_config()
    };
    let service = TranslationService::new(config, translator.clone()).unwrap();

    let summary = service
        .translate_store(Arc::clone(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.batches_dispatched, 12);
    assert_eq!(summary.succeeded, 12);
    for (i, text) in texts.iter().enumerate() {
        let node = store.get(i as u64 + 1).unwrap();
        assert_eq!(node.translated_text, format!("p:{}", text));
    }

    service.shutdown().await;
}

/// 进度观察者收到开始、逐节点、重试步骤与完成通知
#[tokio::test]
async fn test_progress_notifications() {
    let store = store_with(&["alpha beta", "gamma delta"]);
    let translator = ScriptedTranslator::new(vec![Step::Drop("", vec![2]), Step::Prefix("")]);
    let observer = Arc::new(RecordingObserver::default());

    let config = OrchestratorConfig {
        retry: RetryConfig {
            strategy: RetryStrategy::Immediate,
            ..RetryConfig::default()
        },
        ..OrchestratorConfig::default()
    }
    .with_document("doc-1", "sample.txt");

    let orchestrator = Orchestrator::new(Arc::clone(&store), translator, config)
        .with_observer(observer.clone());
    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let events = observer.events.lock().clone();
    assert_eq!(
        events,
        vec![
            "start:doc-1:2".to_string(),
            "node:1:success".to_string(),
            "node:2:failed".to_string(),
            "step:2:1".to_string(),
            "node:2:success".to_string(),
            "complete:doc-1".to_string(),
        ]
    );
}

//! 缓存系统集成测试
//!
//! LRU 淘汰、TTL 过期、语言对隔离以及服务之间共享缓存

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use doc_translator::translation::core::service::TranslationService;
use doc_translator::translation::storage::cache::{generate_cache_key, CacheConfig, TranslationCache};
use doc_translator::translation::TranslationConfig;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{immediate_config, sleep_ms, store_with, ScriptedTranslator, Step};

#[test]
fn test_lru_evicts_single_least_recent_entry() {
    let cache = TranslationCache::with_config(3, Duration::from_secs(60));
    cache.insert("a", "A");
    cache.insert("b", "B");
    cache.insert("c", "C");

    // 访问 a，使 b 成为最久未使用的条目
    assert_eq!(cache.get("a").as_deref(), Some("A"));
    cache.insert("d", "D");

    assert_eq!(cache.size(), 3);
    assert!(!cache.contains("b"));
    assert!(cache.contains("a"));
    assert!(cache.contains("c"));
    assert!(cache.contains("d"));
    assert_eq!(cache.get_stats().evictions, 1);
}

#[tokio::test]
async fn test_ttl_expiry_is_lazy() {
    let cache = TranslationCache::with_config(10, Duration::from_millis(30));
    cache.insert("short lived", "SHORT LIVED");
    assert!(cache.contains("short lived"));

    sleep_ms(60).await;

    // 过期条目在查询前仍占用空间
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get("short lived"), None);
    assert_eq!(cache.size(), 0);

    let stats = cache.get_stats();
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.cache_misses, 1);
}

#[test]
fn test_language_pair_isolation() {
    assert_ne!(
        generate_cache_key("hello", "en", "zh"),
        generate_cache_key("hello", "en", "ja")
    );

    let zh = TranslationCache::from_config(CacheConfig {
        target_lang: "zh".to_string(),
        ..CacheConfig::default()
    });
    let ja = TranslationCache::from_config(CacheConfig {
        target_lang: "ja".to_string(),
        ..CacheConfig::default()
    });
    assert_ne!(zh.cache_key("hello"), ja.cache_key("hello"));
}

#[test]
fn test_hit_rate_statistics() {
    let cache = TranslationCache::new();
    cache.insert_batch(vec![("one", "uno"), ("two", "dos")]);

    let hits = cache.get_batch(["one", "two", "three"]);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits.get("one").map(String::as_str), Some("uno"));

    let stats = cache.get_stats();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.cache_hits, 2);
    assert!((cache.hit_rate() - 2.0 / 3.0).abs() < 1e-9);

    cache.reset_stats();
    assert_eq!(cache.get_stats().total_requests, 0);
}

/// 两个服务共享同一个缓存：第二个服务不再调用翻译回调
#[tokio::test]
async fn test_shared_cache_across_services() {
    let cache = Arc::new(TranslationCache::with_config(100, Duration::from_secs(60)));
    let cancel = CancellationToken::new();
    let config = TranslationConfig {
        cache_enabled: true,
        ..immediate_config()
    };

    let first = ScriptedTranslator::new(vec![Step::Prefix("cached:")]);
    let service = TranslationService::new(config.clone(), first.clone())
        .unwrap()
        .with_cache(Arc::clone(&cache));
    service
        .translate_store(store_with(&["Shared sentence", "Another one"]), &cancel)
        .await
        .unwrap();
    assert_eq!(first.calls(), 1);
    assert_eq!(cache.size(), 2);

    let second = ScriptedTranslator::new(vec![Step::Prefix("fresh:")]);
    let service = TranslationService::new(config, second.clone())
        .unwrap()
        .with_cache(Arc::clone(&cache));
    let store = store_with(&["Another one", "Brand new"]);
    let summary = service
        .translate_store(Arc::clone(&store), &cancel)
        .await
        .unwrap();

    assert_eq!(second.calls(), 1);
    assert_eq!(store.get(1).unwrap().translated_text, "cached:Another one");
    assert_eq!(store.get(2).unwrap().translated_text, "fresh:Brand new");
    assert_eq!(summary.succeeded, 2);

    let metrics = service.metrics().snapshot();
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
}

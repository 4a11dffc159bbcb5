//! 翻译缓存模块
//!
//! 以原文（连同语言对）为键保存译文。条目带创建时间，超过 TTL 的条目在下一次
//! 查询时惰性删除；超出容量时淘汰最久未访问的一条。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::translation::config::constants;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub created_at: Instant,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(translated_text: String) -> Self {
        Self {
            translated_text,
            created_at: Instant::now(),
            access_count: 0,
        }
    }

    /// 检查条目是否过期
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: constants::DEFAULT_CACHE_CAPACITY,
            ttl: constants::DEFAULT_CACHE_TTL,
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    /// 因容量不足被淘汰的条目
    pub evictions: u64,
    /// 因过期被删除的条目
    pub expirations: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 翻译缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    source_lang: String,
    target_lang: String,
    stats: Mutex<CacheStats>,
}

// ============================================================================
// 实现
// ============================================================================

impl TranslationCache {
    /// 使用默认配置创建缓存
    pub fn new() -> Self {
        Self::from_config(CacheConfig::default())
    }

    /// 使用指定容量与 TTL 创建缓存
    pub fn with_config(capacity: usize, ttl: Duration) -> Self {
        Self::from_config(CacheConfig {
            capacity,
            ttl,
            ..CacheConfig::default()
        })
    }

    pub fn from_config(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            source_lang: config.source_lang,
            target_lang: config.target_lang,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// 生成缓存键：语言对与原文的 blake3 摘要
    pub fn cache_key(&self, text: &str) -> String {
        generate_cache_key(text, &self.source_lang, &self.target_lang)
    }

    /// 查询译文，过期条目在此处删除
    pub fn get(&self, text: &str) -> Option<String> {
        let key = self.cache_key(text);
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();
        stats.total_requests += 1;

        let expired = match entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                entry.access_count += 1;
                stats.cache_hits += 1;
                return Some(entry.translated_text.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&key);
            stats.expirations += 1;
        }
        stats.cache_misses += 1;
        None
    }

    /// 写入译文，满员时淘汰最久未访问的条目
    pub fn insert(&self, original: &str, translated: impl Into<String>) {
        let key = self.cache_key(original);
        let mut entries = self.entries.lock();

        if let Some((old_key, _)) = entries.push(key.clone(), CacheEntry::new(translated.into())) {
            if old_key != key {
                self.stats.lock().evictions += 1;
            }
        }
    }

    /// 批量查询，返回命中的 `原文 → 译文`
    pub fn get_batch<'a, I>(&self, texts: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts
            .into_iter()
            .filter_map(|text| self.get(text).map(|hit| (text.to_string(), hit)))
            .collect()
    }

    /// 批量写入
    pub fn insert_batch<I, S>(&self, items: I)
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        for (original, translated) in items {
            self.insert(original.as_ref(), translated.as_ref());
        }
    }

    /// 检查是否包含未过期的条目（不影响访问顺序和统计）
    pub fn contains(&self, text: &str) -> bool {
        let key = self.cache_key(text);
        self.entries
            .lock()
            .peek(&key)
            .is_some_and(|entry| !entry.is_expired(self.ttl))
    }

    /// 主动清理全部过期条目
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            self.stats.lock().expirations += expired.len() as u64;
            tracing::debug!("清理过期缓存条目: {}", expired.len());
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn get_stats(&self) -> CacheStats {
        let total_entries = self.entries.lock().len();
        let mut stats = self.stats.lock().clone();
        stats.total_entries = total_entries;
        stats
    }

    pub fn hit_rate(&self) -> f64 {
        self.stats.lock().hit_rate()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = CacheStats::default();
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}

/// 生成缓存键
pub fn generate_cache_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_lang.as_bytes());
    hasher.update(&[0]);
    hasher.update(target_lang.as_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

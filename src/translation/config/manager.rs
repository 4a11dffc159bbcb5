//! 配置管理器
//!
//! 加载顺序：`.env` 文件 → 默认值 → 配置文件（第一个存在的路径）→ 类型化环境变量覆盖 → 验证。

use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::retry::{RetryConfig, RetryStrategy};

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 语言（用于缓存键）
    pub source_lang: String,
    pub target_lang: String,

    // 批次配置（字符数）
    pub max_batch_size: usize,

    // 重试配置
    pub max_retries: u32,
    pub retry_strategy: RetryStrategy,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_retry_rounds: usize,
    pub max_retry_wait_ms: u64,
    pub context_distance: usize,
    pub context_snippet_chars: usize,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,

    // 并行派发
    pub parallel_enabled: bool,
    pub worker_count: usize,
    pub queue_backlog: usize,

    // 预过滤与去重
    pub prefilter_enabled: bool,
    pub dedup_enabled: bool,
    pub min_text_length: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),

            max_batch_size: constants::DEFAULT_MAX_BATCH_SIZE,

            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_strategy: RetryStrategy::default(),
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,
            max_retry_rounds: constants::DEFAULT_MAX_RETRY_ROUNDS,
            max_retry_wait_ms: constants::DEFAULT_MAX_RETRY_WAIT_MS,
            context_distance: constants::DEFAULT_CONTEXT_DISTANCE,
            context_snippet_chars: constants::DEFAULT_CONTEXT_SNIPPET_CHARS,

            cache_enabled: true,
            cache_capacity: constants::DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),

            parallel_enabled: false,
            worker_count: constants::DEFAULT_WORKER_COUNT,
            queue_backlog: constants::DEFAULT_QUEUE_BACKLOG,

            prefilter_enabled: true,
            dedup_enabled: true,
            min_text_length: constants::MIN_TEXT_LENGTH,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定目标语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(TranslationError::ConfigError("最大尝试次数不能为0".to_string()));
        }

        if self.parallel_enabled && self.worker_count == 0 {
            return Err(TranslationError::ConfigError(
                "启用并行派发时工作者数量不能为0".to_string(),
            ));
        }

        if self.parallel_enabled && self.queue_backlog == 0 {
            return Err(TranslationError::ConfigError("任务队列容量不能为0".to_string()));
        }

        if self.cache_enabled && self.cache_capacity == 0 {
            return Err(TranslationError::ConfigError(
                "启用缓存时缓存大小不能为0".to_string(),
            ));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(TranslationError::ConfigError(format!(
                "重试基础延迟 {}ms 大于最大延迟 {}ms",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }

        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        Ok(())
    }

    /// 应用类型化环境变量覆盖
    ///
    /// 只覆盖显式设置的变量；无法解析的值记录警告后忽略。
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, performance, translation, EnvVar};

        fn apply<T>(result: Option<crate::env::EnvResult<T>>, target: &mut T) {
            match result {
                Some(Ok(value)) => *target = value,
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
                None => {}
            }
        }

        apply(translation::TargetLang::get_explicit(), &mut self.target_lang);
        apply(translation::SourceLang::get_explicit(), &mut self.source_lang);
        apply(translation::BatchSize::get_explicit(), &mut self.max_batch_size);
        apply(translation::MaxRetries::get_explicit(), &mut self.max_retries);
        apply(
            translation::RetryStrategy::get_explicit(),
            &mut self.retry_strategy,
        );
        apply(
            translation::MaxRetryRounds::get_explicit(),
            &mut self.max_retry_rounds,
        );
        apply(
            translation::ContextDistance::get_explicit(),
            &mut self.context_distance,
        );

        apply(cache::Enabled::get_explicit(), &mut self.cache_enabled);
        apply(cache::Capacity::get_explicit(), &mut self.cache_capacity);
        if let Some(ttl) = cache::Ttl::get_explicit() {
            match ttl {
                Ok(ttl) => self.cache_ttl_secs = ttl.as_secs(),
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        apply(performance::WorkerCount::get_explicit(), &mut self.worker_count);
        apply(
            performance::ParallelEnabled::get_explicit(),
            &mut self.parallel_enabled,
        );
    }

    /// 派生重试调度器配置
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            strategy: self.retry_strategy,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            context_distance: self.context_distance,
            context_snippet_chars: self.context_snippet_chars,
            max_batch_size: self.max_batch_size,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_millis(self.max_retry_wait_ms)
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<String>,
}

impl ConfigManager {
    /// 按搜索路径加载配置并应用环境变量覆盖
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let source = Self::find_config_file();
        let mut config = match &source {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path);
                Self::load_from_file(path)?
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                TranslationConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 从指定文件加载配置（不读取环境变量）
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let config = Self::load_from_file(&path)?;
        config.validate()?;
        Ok(Self {
            config,
            source: Some(path),
        })
    }

    /// 直接使用给定配置
    pub fn with_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: None,
        })
    }

    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 实际加载的配置文件路径
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn find_config_file() -> Option<String> {
        constants::CONFIG_PATHS.iter().find_map(|path| {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                Some(expanded.to_string())
            } else {
                None
            }
        })
    }

    /// 从文件加载配置，格式由扩展名决定（TOML / JSON）
    fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        if !Path::new(path).exists() {
            return Err(TranslationError::ConfigError(format!(
                "配置文件不存在: {}",
                path
            )));
        }

        let config = Config::builder()
            .add_source(Config::try_from(&TranslationConfig::default())?)
            .add_source(File::with_name(path))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建配置失败: {}", e)))?;

        config
            .try_deserialize()
            .map_err(|e| TranslationError::ConfigError(format!("反序列化配置失败: {}", e)))
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&TranslationConfig::default())?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.context_snippet_chars, 80);
        assert_eq!(config.retry_max_delay_ms, 30_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TranslationConfig::default();
        config.max_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.parallel_enabled = true;
        config.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
        config.cache_enabled = false;
        assert!(config.validate().is_ok());

        let mut config = TranslationConfig::default();
        config.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "target_lang = \"ja\"").unwrap();
        writeln!(file, "max_batch_size = 500").unwrap();
        writeln!(file, "retry_strategy = \"adaptive\"").unwrap();

        let manager = ConfigManager::from_file(file.path()).unwrap();
        let config = manager.get_config();
        assert_eq!(config.target_lang, "ja");
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.retry_strategy, RetryStrategy::Adaptive);
        assert_eq!(config.max_retries, 3);
        assert!(manager.source().is_some());
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"context_distance": 4, "cache_enabled": false}}"#).unwrap();

        let config = ConfigManager::from_file(file.path()).unwrap().get_config().clone();
        assert_eq!(config.context_distance, 4);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_batch_size = 0").unwrap();
        assert!(ConfigManager::from_file(file.path()).is_err());

        assert!(ConfigManager::from_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_generate_example_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        ConfigManager::generate_example_config(&path).unwrap();

        let loaded = ConfigManager::from_file(&path).unwrap();
        assert_eq!(loaded.get_config(), &TranslationConfig::default());
    }

    #[test]
    fn test_retry_config_derivation() {
        let config = TranslationConfig {
            max_retries: 5,
            retry_strategy: RetryStrategy::Immediate,
            context_distance: 1,
            ..TranslationConfig::default()
        };
        let retry = config.retry_config();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.strategy, RetryStrategy::Immediate);
        assert_eq!(retry.context_distance, 1);
        assert_eq!(retry.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_only_explicit_values() {
        std::env::set_var("DOC_TRANSLATOR_CONTEXT_DISTANCE", "4");
        std::env::set_var("DOC_TRANSLATOR_MAX_RETRY_ROUNDS", "lots");

        let mut config = TranslationConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("DOC_TRANSLATOR_CONTEXT_DISTANCE");
        std::env::remove_var("DOC_TRANSLATOR_MAX_RETRY_ROUNDS");

        assert_eq!(config.context_distance, 4);
        // 无效值被忽略
        assert_eq!(config.max_retry_rounds, constants::DEFAULT_MAX_RETRY_ROUNDS);
        assert_eq!(config.target_lang, constants::DEFAULT_TARGET_LANG);
    }
}

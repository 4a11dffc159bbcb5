//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者。过滤规则优先取 `RUST_LOG`，
//! 否则取 `DOC_TRANSLATOR_LOG_LEVEL`（默认 `info`）。设置了 `NO_COLOR` 时关闭彩色输出。

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::env::{core, EnvVar};

static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// 初始化全局日志，可以重复调用
///
/// 返回是否由本库安装了全局订阅者；已有其他全局订阅者时返回 `false`。
pub fn init_logging() -> bool {
    *LOGGER_INITIALIZED.get_or_init(|| {
        let filter = filter_from_env();
        let ansi = !core::NoColor::get().unwrap_or(false);

        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(ansi)
                    .with_filter(filter),
            )
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!("日志已初始化");
        }
        installed
    })
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("{}，使用 info 级别", e);
        "info".to_string()
    });
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

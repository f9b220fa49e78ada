//! # 日志初始化模块
//!
//! 为各个服务提供统一的 tracing 日志初始化能力。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// 优先使用环境变量 `RUST_LOG`，未设置时使用配置中的日志级别；
/// 未提供配置时使用默认配置（info 级别）。
///
/// # 示例
/// ```rust,ignore
/// use supergroup_core::config::LoggingConfig;
///
/// init_tracing_from_config(None);
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     with_target: false,
///     with_thread_ids: true,
///     with_file: true,
///     with_line_number: true,
/// };
/// init_tracing_from_config(Some(&config));
/// ```
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.level.as_str()),
    };

    let builder = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter);

    // 测试或重复初始化时全局 subscriber 可能已存在
    if builder.try_init().is_err() {
        ::tracing::debug!("tracing subscriber already initialised");
    }
}

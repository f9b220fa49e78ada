//! Supergroup Core 公共库
//!
//! 提供统一的配置加载、错误类型、日志初始化、指标与分片标识计算

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;
pub mod utils;

pub use config::{
    ConfigManager, DistributorServiceConfig, LoggingConfig, PlatformConfig,
    PostgresInstanceConfig, SupergroupAppConfig, load_config,
};
pub use error::{ErrorBuilder, ErrorCode, Result, SupergroupError};
pub use utils::{shard_id, shard_ids};

//! Supergroup Core 配置模块
//!
//! 该模块提供了应用程序配置管理功能，包括：
//! - 配置文件加载和解析（单文件或目录分片合并）
//! - 环境特定配置覆盖
//! - 日志、数据库、平台凭证与分发服务配置定义

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 全局应用配置实例，使用 OnceLock 确保只初始化一次
static APP_CONFIG: OnceLock<SupergroupAppConfig> = OnceLock::new();

/// 平台默认 API 地址
pub const DEFAULT_PLATFORM_API_BASE: &str = "https://mixin-api.zeromesh.net";

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default = "default_true")]
    pub with_file: bool,
    #[serde(default = "default_true")]
    pub with_line_number: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: false,
            with_thread_ids: false,
            with_file: true,
            with_line_number: true,
        }
    }
}

/// PostgreSQL 数据库实例配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PostgresInstanceConfig {
    /// 数据库连接 URL
    pub url: String,
    /// 最大连接数
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// 最小连接数
    #[serde(default)]
    pub min_connections: Option<u32>,
    /// 获取连接超时（毫秒）
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

/// 第三方消息平台凭证
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlatformConfig {
    /// 机器人自身的用户 ID（同时作为签名 uid）
    #[serde(default)]
    pub client_id: String,
    /// 会话 ID
    #[serde(default)]
    pub session_id: String,
    /// 会话私钥（base64 编码的 Ed25519 私钥）
    #[serde(default)]
    pub session_key: String,
    /// API 基础地址
    #[serde(default)]
    pub api_base: Option<String>,
}

impl PlatformConfig {
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_PLATFORM_API_BASE)
    }
}

/// 消息分发服务配置
///
/// 所有字段均为可选，缺省值由分发服务自行决定。
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DistributorServiceConfig {
    /// 使用的 PostgreSQL 配置名
    #[serde(default)]
    pub postgres: Option<String>,
    /// 分片数量
    #[serde(default)]
    pub message_shard_size: Option<u32>,
    /// 分片盐值，修改后分片标识整体轮换
    #[serde(default)]
    pub message_shard_modifier: Option<String>,
    /// 单批最大消息数
    #[serde(default)]
    pub batch_limit: Option<usize>,
    /// 单次请求超时（毫秒）
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// 是否启用过期消息清理
    #[serde(default)]
    pub immediate_delete_expired_distributed_msg_enable: Option<bool>,
    /// 未投递消息的有效期（秒）
    #[serde(default)]
    pub message_expiry_seconds: Option<u64>,
    /// 同一批次连续被平台拒绝多少次后进入隔离投递，0 表示不隔离
    #[serde(default)]
    pub max_batch_attempts: Option<u32>,
    /// 失败退避（毫秒）
    #[serde(default)]
    pub error_backoff_ms: Option<u64>,
    /// 空队列退避（毫秒）
    #[serde(default)]
    pub idle_backoff_ms: Option<u64>,
    /// 清理完成后的轮询间隔（毫秒）
    #[serde(default)]
    pub sweep_idle_backoff_ms: Option<u64>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    /// 消息分发服务配置
    #[serde(default)]
    pub distributor: Option<DistributorServiceConfig>,
}

/// Supergroup 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SupergroupAppConfig {
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// PostgreSQL 配置映射
    #[serde(default)]
    pub postgres: HashMap<String, PostgresInstanceConfig>,
    /// 平台凭证
    #[serde(default)]
    pub platform: PlatformConfig,
    /// 服务配置
    #[serde(default)]
    pub services: ServicesConfig,
}

impl SupergroupAppConfig {
    /// 获取 PostgreSQL 配置
    pub fn postgres_profile(&self, name: &str) -> Option<&PostgresInstanceConfig> {
        self.postgres.get(name)
    }

    /// 获取消息分发服务配置
    pub fn distributor_service(&self) -> DistributorServiceConfig {
        self.services.distributor.clone().unwrap_or_default()
    }

    /// 校验配置之间的引用关系
    pub fn validate_references(&self) -> Result<()> {
        if let Some(name) = self.distributor_service().postgres.as_deref() {
            if self.postgres_profile(name).is_none() {
                return Err(anyhow!(
                    "services.distributor references unknown postgres profile `{name}`"
                ));
            }
        }
        Ok(())
    }
}

/// 加载配置
pub fn load_config(path: Option<&str>) -> &'static SupergroupAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    APP_CONFIG.get_or_init(|| load_with_fallback(&candidates))
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> SupergroupAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    SupergroupAppConfig::default()
}

/// 从源加载配置（文件或目录），并叠加环境特定配置
pub fn load_config_from_source(path: &Path) -> Result<SupergroupAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    let mut merged = if metadata.is_dir() {
        load_directory_value(path)?
    } else {
        load_toml_value(path)?
    };

    let env_root = if metadata.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    ConfigManager::load_environment_config(&env_root, &mut merged)?;

    merged
        .try_into()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// 从目录加载配置：base.toml + shared/ + services/ + overrides/
fn load_directory_value(path: &Path) -> Result<Value> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    Ok(merged)
}

/// 合并目录中的配置
fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

/// 加载 TOML 值
fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 合并值：表格递归合并，其余类型直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}

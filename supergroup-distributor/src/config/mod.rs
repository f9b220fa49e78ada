//! 消息分发服务配置

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail};
use supergroup_core::config::SupergroupAppConfig;

/// 平台单批消息上限
pub const DEFAULT_BATCH_LIMIT: usize = 80;

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub postgres_profile: String,
    pub shard_size: u32,
    pub shard_modifier: String,
    pub batch_limit: usize,
    pub request_timeout: Duration,
    pub sweeper_enabled: bool,
    pub message_expiry: Duration,
    pub max_batch_attempts: u32,
    pub error_backoff: Duration,
    pub idle_backoff: Duration,
    pub sweep_idle_backoff: Duration,
    // 平台凭证
    pub api_base: String,
    pub client_id: String,
    pub session_id: String,
    pub session_key: String,
}

impl DistributorConfig {
    pub fn from_app_config(app: &SupergroupAppConfig) -> Self {
        Self::resolve(app, |key| env::var(key).ok())
    }

    /// 按 环境变量 > 配置文件 > 默认值 的优先级解析
    pub fn resolve<F>(app: &SupergroupAppConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service = app.distributor_service();
        let platform = &app.platform;

        let parsed = |key: &str| parse_var::<u64>(&lookup, key);

        let postgres_profile = lookup("DISTRIBUTOR_POSTGRES_PROFILE")
            .or_else(|| service.postgres.clone())
            .unwrap_or_else(|| "default".to_string());

        let shard_size = parse_var::<u32>(&lookup, "DISTRIBUTOR_SHARD_SIZE")
            .or(service.message_shard_size)
            .unwrap_or(1);

        let shard_modifier = lookup("DISTRIBUTOR_SHARD_MODIFIER")
            .or_else(|| service.message_shard_modifier.clone())
            .unwrap_or_default();

        let batch_limit = parse_var::<usize>(&lookup, "DISTRIBUTOR_BATCH_LIMIT")
            .or(service.batch_limit)
            .unwrap_or(DEFAULT_BATCH_LIMIT);

        let request_timeout_ms = parsed("DISTRIBUTOR_REQUEST_TIMEOUT_MS")
            .or(service.request_timeout_ms)
            .unwrap_or(3000);

        let sweeper_enabled = parse_var::<bool>(&lookup, "DISTRIBUTOR_SWEEPER_ENABLED")
            .or(service.immediate_delete_expired_distributed_msg_enable)
            .unwrap_or(false);

        let message_expiry_seconds = parsed("DISTRIBUTOR_MESSAGE_EXPIRY_SECONDS")
            .or(service.message_expiry_seconds)
            .unwrap_or(3600);

        let max_batch_attempts = parse_var::<u32>(&lookup, "DISTRIBUTOR_MAX_BATCH_ATTEMPTS")
            .or(service.max_batch_attempts)
            .unwrap_or(20);

        // 退避配置
        let error_backoff_ms = parsed("DISTRIBUTOR_ERROR_BACKOFF_MS")
            .or(service.error_backoff_ms)
            .unwrap_or(100);
        let idle_backoff_ms = parsed("DISTRIBUTOR_IDLE_BACKOFF_MS")
            .or(service.idle_backoff_ms)
            .unwrap_or(500);
        let sweep_idle_backoff_ms = parsed("DISTRIBUTOR_SWEEP_IDLE_BACKOFF_MS")
            .or(service.sweep_idle_backoff_ms)
            .unwrap_or(60_000);

        let api_base = lookup("DISTRIBUTOR_API_BASE")
            .unwrap_or_else(|| platform.api_base().to_string());
        let client_id = lookup("DISTRIBUTOR_CLIENT_ID").unwrap_or_else(|| platform.client_id.clone());
        let session_id =
            lookup("DISTRIBUTOR_SESSION_ID").unwrap_or_else(|| platform.session_id.clone());
        let session_key =
            lookup("DISTRIBUTOR_SESSION_KEY").unwrap_or_else(|| platform.session_key.clone());

        Self {
            postgres_profile,
            shard_size,
            shard_modifier,
            batch_limit,
            request_timeout: Duration::from_millis(request_timeout_ms),
            sweeper_enabled,
            message_expiry: Duration::from_secs(message_expiry_seconds),
            max_batch_attempts,
            error_backoff: Duration::from_millis(error_backoff_ms),
            idle_backoff: Duration::from_millis(idle_backoff_ms),
            sweep_idle_backoff: Duration::from_millis(sweep_idle_backoff_ms),
            api_base,
            client_id,
            session_id,
            session_key,
        }
    }

    /// 启动前校验
    pub fn validate(&self) -> Result<()> {
        if self.shard_size == 0 {
            bail!("message_shard_size must be greater than zero");
        }
        if self.shard_modifier.trim().is_empty() {
            bail!("message_shard_modifier must not be empty");
        }
        if self.batch_limit == 0 {
            bail!("batch_limit must be greater than zero");
        }
        if self.request_timeout.is_zero() {
            bail!("request_timeout_ms must be greater than zero");
        }
        if self.client_id.is_empty() || self.session_id.is_empty() || self.session_key.is_empty() {
            bail!("platform client_id, session_id and session_key are required");
        }
        Ok(())
    }
}

/// 读取并解析环境变量，无法解析或超出类型范围时忽略
fn parse_var<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn app(toml_src: &str) -> SupergroupAppConfig {
        toml::from_str(toml_src).unwrap()
    }

    const SAMPLE: &str = r#"
        [platform]
        client_id = "bot"
        session_id = "session"
        session_key = "key"

        [services.distributor]
        message_shard_size = 4
        message_shard_modifier = "v1"
        immediate_delete_expired_distributed_msg_enable = true
    "#;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = DistributorConfig::resolve(&app(SAMPLE), |_| None);
        assert_eq!(cfg.shard_size, 4);
        assert_eq!(cfg.shard_modifier, "v1");
        assert_eq!(cfg.batch_limit, DEFAULT_BATCH_LIMIT);
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
        assert_eq!(cfg.error_backoff, Duration::from_millis(100));
        assert_eq!(cfg.idle_backoff, Duration::from_millis(500));
        assert_eq!(cfg.sweep_idle_backoff, Duration::from_secs(60));
        assert!(cfg.sweeper_enabled);
        assert_eq!(cfg.postgres_profile, "default");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn environment_overrides_config_file() {
        let env: HashMap<&str, &str> = [
            ("DISTRIBUTOR_SHARD_SIZE", "8"),
            ("DISTRIBUTOR_SHARD_MODIFIER", "v2"),
            ("DISTRIBUTOR_SWEEPER_ENABLED", "false"),
            ("DISTRIBUTOR_SESSION_KEY", "rotated"),
        ]
        .into_iter()
        .collect();

        let cfg = DistributorConfig::resolve(&app(SAMPLE), |key| {
            env.get(key).map(|v| v.to_string())
        });
        assert_eq!(cfg.shard_size, 8);
        assert_eq!(cfg.shard_modifier, "v2");
        assert!(!cfg.sweeper_enabled);
        assert_eq!(cfg.session_key, "rotated");
        assert_eq!(cfg.client_id, "bot");
    }

    #[test]
    fn out_of_range_overrides_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("DISTRIBUTOR_SHARD_SIZE", "4294967297"),
            ("DISTRIBUTOR_MAX_BATCH_ATTEMPTS", "-1"),
            ("DISTRIBUTOR_BATCH_LIMIT", "eighty"),
        ]
        .into_iter()
        .collect();

        let cfg = DistributorConfig::resolve(&app(SAMPLE), |key| {
            env.get(key).map(|v| v.to_string())
        });
        assert_eq!(cfg.shard_size, 4);
        assert_eq!(cfg.max_batch_attempts, 20);
        assert_eq!(cfg.batch_limit, DEFAULT_BATCH_LIMIT);
    }

    #[test]
    fn validation_rejects_missing_pieces() {
        let mut cfg = DistributorConfig::resolve(&app(SAMPLE), |_| None);
        cfg.shard_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DistributorConfig::resolve(&app(SAMPLE), |_| None);
        cfg.shard_modifier.clear();
        assert!(cfg.validate().is_err());

        let cfg = DistributorConfig::resolve(&SupergroupAppConfig::default(), |_| None);
        assert!(cfg.validate().is_err());
    }
}

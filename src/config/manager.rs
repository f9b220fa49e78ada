//! 配置管理器 - 负责处理不同环境下的配置覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 获取当前运行环境
//! - 加载环境特定配置并合并到基础配置中

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::merge_value;

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称
    ///
    /// 从环境变量 SUPERGROUP_ENV 获取当前环境名称，
    /// 如果未设置则默认为 "development"
    pub fn get_environment() -> String {
        env::var("SUPERGROUP_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 `{root}/environments/{environment}.toml` 文件中的配置，
    /// 并将其合并到基础配置中；文件不存在时不做任何修改
    pub fn load_environment_config(root: &Path, base: &mut Value) -> Result<()> {
        Self::merge_environment(root, &Self::get_environment(), base)
    }

    /// 将指定环境的配置合并到基础配置中
    pub fn merge_environment(root: &Path, environment: &str, base: &mut Value) -> Result<()> {
        let env_config_path = root
            .join("environments")
            .join(format!("{environment}.toml"));

        if !env_config_path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&env_config_path).with_context(|| {
            format!(
                "unable to read environment config {}",
                env_config_path.display()
            )
        })?;
        let overlay: Value = toml::from_str(&content).with_context(|| {
            format!(
                "invalid environment config format {}",
                env_config_path.display()
            )
        })?;

        merge_value(base, overlay);
        Ok(())
    }
}

//! 服务模块 - 包含服务启动相关功能

pub mod bootstrap;

pub use bootstrap::{ApplicationBootstrap, ApplicationContext};

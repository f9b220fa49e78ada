//! 超级群消息分发服务
//!
//! 从分片化的待投递队列中按批取出消息，签名后投递到消息平台，
//! 成功后推进投递状态；可选地清理过期未投递的消息。

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interface;
pub mod service;

pub use config::DistributorConfig;
pub use error::DeliveryError;
pub use interface::runtime::Distributor;

//! 领域服务

pub mod batch_sender;

pub use batch_sender::{BatchSender, MESSAGES_PATH};

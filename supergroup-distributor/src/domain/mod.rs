pub mod model;
pub mod repository;
pub mod service;

pub use model::{DistributedMessage, MessageCategory, MessageStatus};
pub use repository::{DeliveryTransport, DistributionQueue, RequestSigner, TransportFactory};
pub use service::BatchSender;

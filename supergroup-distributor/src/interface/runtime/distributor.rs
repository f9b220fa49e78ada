//! 分发运行时：每个分片一个投递任务，外加可选的过期清理任务

use std::sync::Arc;

use futures::future::join_all;
use supergroup_core::metrics::DistributorMetrics;
use supergroup_core::utils::shard_ids;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::{ExpirySweeper, PartitionWorker};
use crate::config::DistributorConfig;
use crate::domain::repository::{DistributionQueue, RequestSigner, TransportFactory};
use crate::domain::service::BatchSender;
use crate::error::DeliveryError;
use crate::infrastructure::retry::BackoffPolicy;

pub struct Distributor {
    shards: Vec<String>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Distributor {
    /// 启动所有分片任务
    ///
    /// 每个分片在启动时创建自己的传输客户端，创建失败视为启动失败。
    pub fn start(
        config: &DistributorConfig,
        queue: Arc<dyn DistributionQueue>,
        transports: &dyn TransportFactory,
        signer: Arc<dyn RequestSigner>,
        metrics: Arc<DistributorMetrics>,
    ) -> Result<Self, DeliveryError> {
        let shards = shard_ids(&config.shard_modifier, config.shard_size);
        let backoff = BackoffPolicy::from_config(config);
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(shards.len());
        for shard in &shards {
            let transport = transports.create(shard)?;
            let sender = BatchSender::new(
                transport,
                signer.clone(),
                config.client_id.clone(),
                config.batch_limit,
            );
            workers.push(PartitionWorker::new(
                shard.clone(),
                queue.clone(),
                sender,
                backoff.clone(),
                config.max_batch_attempts,
                metrics.clone(),
            ));
        }

        let mut handles: Vec<JoinHandle<()>> = workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run(cancel.child_token())))
            .collect();

        if config.sweeper_enabled {
            let sweeper = ExpirySweeper::new(
                shards.clone(),
                queue,
                config.message_expiry,
                backoff,
                metrics,
            );
            handles.push(tokio::spawn(sweeper.run(cancel.child_token())));
        }

        info!(
            shard_count = shards.len(),
            batch_limit = config.batch_limit,
            sweeper_enabled = config.sweeper_enabled,
            "distributor started"
        );

        Ok(Self {
            shards,
            cancel,
            handles,
        })
    }

    pub fn shards(&self) -> &[String] {
        &self.shards
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 取消所有任务并等待退出
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for result in join_all(self.handles).await {
            if let Err(err) = result {
                error!(error = %err, "distributor task terminated abnormally");
            }
        }
        info!("distributor stopped");
    }
}

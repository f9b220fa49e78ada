//! 应用启动器 - 负责依赖注入和服务启动

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use supergroup_core::SupergroupAppConfig;
use supergroup_core::metrics::DistributorMetrics;
use tracing::info;

use crate::config::DistributorConfig;
use crate::domain::repository::{DistributionQueue, RequestSigner};
use crate::infrastructure::auth::PlatformTokenSigner;
use crate::infrastructure::database::create_db_pool;
use crate::infrastructure::http::PlatformHttpClientFactory;
use crate::infrastructure::persistence::PostgresDistributionQueue;
use crate::interface::runtime::Distributor;

/// 应用上下文 - 包含所有已初始化的依赖
pub struct ApplicationContext {
    pub config: DistributorConfig,
    pub queue: Arc<dyn DistributionQueue>,
    pub signer: Arc<dyn RequestSigner>,
    pub transports: PlatformHttpClientFactory,
    pub metrics: Arc<DistributorMetrics>,
}

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(app_config: &'static SupergroupAppConfig) -> Result<()> {
        let context = Self::create_context(app_config).await?;
        let distributor = Distributor::start(
            &context.config,
            context.queue.clone(),
            &context.transports,
            context.signer.clone(),
            context.metrics.clone(),
        )
        .context("failed to start distributor")?;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("shutdown signal received");

        distributor.shutdown().await;
        Ok(())
    }

    /// 创建应用上下文
    pub async fn create_context(app_config: &SupergroupAppConfig) -> Result<ApplicationContext> {
        app_config.validate_references()?;

        let config = DistributorConfig::from_app_config(app_config);
        config.validate().context("invalid distributor configuration")?;

        let postgres = app_config
            .postgres_profile(&config.postgres_profile)
            .ok_or_else(|| anyhow!("postgres profile `{}` not found", config.postgres_profile))?;
        let pool = create_db_pool(postgres).await?;

        let queue = PostgresDistributionQueue::new(pool);
        queue
            .init_schema()
            .await
            .context("failed to initialize distribution schema")?;

        let signer = PlatformTokenSigner::new(
            config.client_id.clone(),
            config.session_id.clone(),
            &config.session_key,
        )
        .context("invalid platform session key")?;

        let transports = PlatformHttpClientFactory::new(config.api_base.clone(), config.request_timeout);

        info!(
            shard_count = config.shard_size,
            api_base = %config.api_base,
            postgres = %config.postgres_profile,
            "Distributor initialized"
        );

        Ok(ApplicationContext {
            config,
            queue: Arc::new(queue),
            signer: Arc::new(signer),
            transports,
            metrics: Arc::new(DistributorMetrics::new()),
        })
    }
}

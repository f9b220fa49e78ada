use supergroup_core::load_config;
use supergroup_core::tracing::init_tracing_from_config;
use supergroup_distributor::service::ApplicationBootstrap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = load_config(Some("config"));
    init_tracing_from_config(Some(&app_config.logging));

    ApplicationBootstrap::run(app_config).await
}

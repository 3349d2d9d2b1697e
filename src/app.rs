use crate::adapters::{HttpTransport, LocalStorage};
use crate::core::artifact::ArtifactLoader;
use crate::core::eth::EthClient;
use crate::core::repository::MarketRepository;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use std::sync::Arc;

/// Wires an HTTP node connection and on-disk artifacts into a repository.
pub async fn build_repository<C: ConfigProvider>(config: &C) -> Result<MarketRepository> {
    // 先確認 sender，避免交易從節點預設帳號送出
    let sender = config.sender()?;

    let transport = HttpTransport::new(config.rpc_endpoint(), config.request_timeout())?;
    tracing::info!("Connecting to Ethereum node at {}", transport.endpoint());
    let eth = EthClient::new(Arc::new(transport));

    let loader = ArtifactLoader::new(LocalStorage::new(config.artifact_base_dir().to_string()));
    let (market, factory) = loader
        .load_pair(config.market_artifact_path(), config.factory_artifact_path())
        .await?;

    Ok(MarketRepository::new(eth, market, factory)?
        .with_sender(sender)
        .with_poll_interval(config.poll_interval()))
}

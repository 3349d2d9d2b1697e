use crate::core::artifact::ContractArtifact;
use crate::core::binding::{ContractBinding, DeployParams, PendingDeployment};
use crate::core::eth::EthClient;
use crate::core::market::Market;
use crate::domain::model::{Address, Bytes, TxHash};
use crate::utils::error::Result;
use std::time::Duration;

/// Gas for the factory deployment; the factory also deploys the market and
/// its token, so the node's estimate is not used.
pub const DEPLOY_GAS_LIMIT: u64 = 3_500_000;

/// Deploys markets through `MarketFactory` and wraps market addresses into
/// [`Market`] handles.
#[derive(Clone)]
pub struct MarketRepository {
    eth: EthClient,
    market_contract: ContractBinding,
    factory_contract: ContractBinding,
    factory_bytecode: Bytes,
    sender: Option<Address>,
}

impl MarketRepository {
    pub fn new(
        eth: EthClient,
        market_artifact: ContractArtifact,
        factory_artifact: ContractArtifact,
    ) -> Result<Self> {
        let factory_bytecode = factory_artifact.require_bytecode()?.clone();

        Ok(Self {
            market_contract: ContractBinding::new(market_artifact.abi, eth.clone()),
            factory_contract: ContractBinding::new(factory_artifact.abi, eth.clone()),
            eth,
            factory_bytecode,
            sender: None,
        })
    }

    /// Sends from this account instead of the node's first account.
    pub fn with_sender(mut self, sender: Option<Address>) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.market_contract = self.market_contract.with_poll_interval(poll_interval);
        self.factory_contract = self.factory_contract.with_poll_interval(poll_interval);
        self
    }

    async fn sender(&self) -> Result<Address> {
        match self.sender {
            Some(sender) => Ok(sender),
            None => self.eth.default_account().await,
        }
    }

    /// Submits a new `MarketFactory`. Resolves as soon as the node hands
    /// back the transaction hash; await [`PendingMarket::confirmed`] for the
    /// market itself.
    pub async fn create(&self) -> Result<PendingMarket> {
        let from = self.sender().await?;
        let deployment = self
            .factory_contract
            .deploy(DeployParams {
                from,
                gas: DEPLOY_GAS_LIMIT,
                data: self.factory_bytecode.clone(),
                args: Vec::new(),
            })
            .await?;

        tracing::info!(
            "MarketFactory deployment submitted: {}",
            deployment.transaction_hash()
        );

        Ok(PendingMarket {
            deployment,
            repository: self.clone(),
        })
    }

    /// Callback form of [`create`](Self::create): `on_transaction_hash` runs
    /// exactly once, before the returned future resolves.
    pub async fn create_with<F>(&self, on_transaction_hash: F) -> Result<Market>
    where
        F: FnOnce(TxHash),
    {
        let pending = self.create().await?;
        on_transaction_hash(pending.transaction_hash());
        pending.confirmed().await
    }

    /// Wraps an address without checking that a market lives there.
    pub fn from_address(&self, address: Address) -> Market {
        Market::new(self.market_contract.at(address).with_sender(self.sender))
    }
}

/// A market whose factory deployment has been submitted but not confirmed.
pub struct PendingMarket {
    deployment: PendingDeployment,
    repository: MarketRepository,
}

impl PendingMarket {
    pub fn transaction_hash(&self) -> TxHash {
        self.deployment.transaction_hash()
    }

    /// Waits for the factory to be mined, then reads the market it built.
    pub async fn confirmed(self) -> Result<Market> {
        let tx_hash = self.deployment.transaction_hash();
        let factory = self
            .deployment
            .wait()
            .await?
            .with_sender(self.repository.sender);
        tracing::info!("MarketFactory deployed at {} ({})", factory.address(), tx_hash);

        let market_address = factory.call_address("market").await?;
        tracing::info!("Market created at {}", market_address);

        Ok(self.repository.from_address(market_address))
    }
}

pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ClientConfig;

pub use adapters::{HttpTransport, LocalStorage};
pub use app::build_repository;
pub use crate::core::{
    abi::Token,
    artifact::{ArtifactLoader, ContractArtifact},
    binding::{ContractBinding, ContractInstance, PendingDeployment},
    eth::EthClient,
    market::Market,
    repository::{MarketRepository, PendingMarket, DEPLOY_GAS_LIMIT},
};
pub use domain::model::{Address, DeploymentStatus, TxHash};
pub use utils::error::{MarketError, Result};

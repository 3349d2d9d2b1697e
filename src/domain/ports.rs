use crate::domain::model::Address;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn rpc_endpoint(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn poll_interval(&self) -> Duration;
    /// Configured `from` account; `Ok(None)` means "use the node's first account".
    fn sender(&self) -> Result<Option<Address>>;
    fn artifact_base_dir(&self) -> &str;
    fn market_artifact_path(&self) -> &str;
    fn factory_artifact_path(&self) -> &str;
}

/// One JSON-RPC round trip to an Ethereum node.
///
/// Returns the `result` member of the response; node-side errors come back
/// as `MarketError::Rpc` with the node's code and message untouched.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;
}

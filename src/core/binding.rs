use crate::core::abi::{Abi, Token};
use crate::core::eth::EthClient;
use crate::domain::model::{Address, Bytes, DeploymentStatus, TransactionRequest, TxHash};
use crate::utils::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct DeployParams {
    pub from: Address,
    pub gas: u64,
    /// Creation bytecode.
    pub data: Bytes,
    /// Constructor arguments, ABI-encoded after the bytecode. Left empty the
    /// bytecode goes out as-is, without checking the constructor's inputs.
    pub args: Vec<Token>,
}

/// Local proxy for one contract type: deploys new instances or attaches to
/// existing ones.
#[derive(Clone)]
pub struct ContractBinding {
    abi: Arc<Abi>,
    eth: EthClient,
    poll_interval: Duration,
}

impl ContractBinding {
    pub fn new(abi: Abi, eth: EthClient) -> Self {
        Self {
            abi: Arc::new(abi),
            eth,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Submits a contract creation transaction. Returns once the node has
    /// accepted it and handed back the transaction hash.
    pub async fn deploy(&self, params: DeployParams) -> Result<PendingDeployment> {
        let mut data = params.data.0;
        if !params.args.is_empty() {
            data.extend_from_slice(&self.abi.encode_constructor(&params.args)?);
        }
        let request = TransactionRequest {
            from: Some(params.from),
            to: None,
            gas: Some(params.gas),
            data: Bytes(data),
        };

        let tx_hash = self.eth.send_transaction(&request).await?;
        tracing::debug!("Deployment submitted from {} in {}", params.from, tx_hash);

        Ok(PendingDeployment {
            tx_hash,
            binding: self.clone(),
            submitted_at: Utc::now(),
        })
    }

    /// Never touches the network; a wrong address only shows up on the first call.
    pub fn at(&self, address: Address) -> ContractInstance {
        ContractInstance {
            address,
            abi: self.abi.clone(),
            eth: self.eth.clone(),
            from: None,
        }
    }
}

/// A contract creation transaction the node has accepted but that may not
/// be mined yet.
pub struct PendingDeployment {
    tx_hash: TxHash,
    binding: ContractBinding,
    submitted_at: DateTime<Utc>,
}

impl PendingDeployment {
    pub fn transaction_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub async fn poll(&self) -> Result<DeploymentStatus> {
        let Some(receipt) = self.binding.eth.transaction_receipt(self.tx_hash).await? else {
            return Ok(DeploymentStatus::Pending);
        };

        if receipt.is_reverted() {
            return Err(MarketError::DeploymentReverted {
                tx_hash: self.tx_hash.to_string(),
            });
        }

        match receipt.contract_address {
            Some(address) if !address.is_zero() => Ok(DeploymentStatus::Deployed(address)),
            _ => Err(MarketError::MissingContractAddress {
                tx_hash: self.tx_hash.to_string(),
            }),
        }
    }

    /// Polls until the receipt shows up. No timeout of its own; wrap in
    /// `tokio::time::timeout` when one is needed.
    pub async fn wait(self) -> Result<ContractInstance> {
        loop {
            match self.poll().await? {
                DeploymentStatus::Deployed(address) => {
                    let elapsed = Utc::now() - self.submitted_at;
                    tracing::debug!(
                        "Contract mined at {} after {}ms",
                        address,
                        elapsed.num_milliseconds()
                    );
                    return Ok(self.binding.at(address));
                }
                DeploymentStatus::Pending => {
                    tokio::time::sleep(self.binding.poll_interval).await;
                }
            }
        }
    }
}

/// A binding attached to one deployed address.
#[derive(Clone)]
pub struct ContractInstance {
    address: Address,
    abi: Arc<Abi>,
    eth: EthClient,
    from: Option<Address>,
}

impl std::fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractInstance")
            .field("address", &self.address)
            .field("from", &self.from)
            .finish()
    }
}

impl ContractInstance {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Fixes the account used for calls and transactions; otherwise the
    /// node's first account is used.
    pub fn with_sender(mut self, from: Option<Address>) -> Self {
        self.from = from;
        self
    }

    async fn sender(&self) -> Result<Address> {
        match self.from {
            Some(from) => Ok(from),
            None => self.eth.default_account().await,
        }
    }

    /// Read-only `eth_call`, outputs decoded per the ABI.
    pub async fn call(&self, function: &str, args: &[Token]) -> Result<Vec<Token>> {
        let function = self.abi.function(function, args.len())?;
        let request = TransactionRequest {
            from: Some(self.sender().await?),
            to: Some(self.address),
            gas: None,
            data: Bytes(function.encode_input(args)?),
        };

        let output = self.eth.call(&request).await?;
        function.decode_output(output.as_ref())
    }

    /// First output of a read-only call.
    pub async fn call_single(&self, function: &str, args: &[Token]) -> Result<Token> {
        self.call(function, args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::abi(format!("{} has no outputs", function)))
    }

    pub async fn call_address(&self, function: &str) -> Result<Address> {
        self.call_single(function, &[])
            .await?
            .into_address()
            .ok_or_else(|| MarketError::abi(format!("{} did not return an address", function)))
    }

    /// State-changing transaction; the node estimates gas.
    pub async fn send(&self, function: &str, args: &[Token]) -> Result<TxHash> {
        let function = self.abi.function(function, args.len())?;
        let request = TransactionRequest {
            from: Some(self.sender().await?),
            to: Some(self.address),
            gas: None,
            data: Bytes(function.encode_input(args)?),
        };

        let tx_hash = self.eth.send_transaction(&request).await?;
        tracing::debug!("{} sent to {} in {}", function.signature(), self.address, tx_hash);
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abi::Selector;
    use crate::core::eth::testing::MockTransport;
    use serde_json::json;

    const ACCOUNT: &str = "0x627306090abab3a6e1400e9345bc60c78a8bef57";
    const CONTRACT: &str = "0x345ca3e014aaf5dca488057592ee47305d9b3e10";

    fn tx_hash() -> String {
        format!("0x{}", "ab".repeat(32))
    }

    fn factory_abi() -> Abi {
        serde_json::from_value(json!([
            {"type": "constructor", "inputs": [{"name": "supply", "type": "uint256"}]},
            {"type": "function", "name": "market", "constant": true,
             "inputs": [], "outputs": [{"name": "", "type": "address"}]},
            {"type": "function", "name": "setUserName", "constant": false,
             "inputs": [{"name": "name", "type": "string"}], "outputs": []}
        ]))
        .unwrap()
    }

    fn binding(transport: &Arc<MockTransport>) -> ContractBinding {
        ContractBinding::new(factory_abi(), EthClient::new(transport.clone()))
            .with_poll_interval(Duration::from_millis(1))
    }

    fn deploy_params() -> DeployParams {
        DeployParams {
            from: ACCOUNT.parse().unwrap(),
            gas: 3_500_000,
            data: Bytes(vec![0x60, 0x60]),
            args: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deploy_then_wait_for_pending_receipt() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));
        transport.on("eth_getTransactionReceipt", |_| Ok(json!(null)));
        transport.on("eth_getTransactionReceipt", |_| Ok(json!(null)));
        transport.on("eth_getTransactionReceipt", |_| {
            Ok(json!({
                "transactionHash": tx_hash(),
                "contractAddress": CONTRACT,
                "status": "0x1"
            }))
        });

        let pending = binding(&transport).deploy(deploy_params()).await.unwrap();
        assert_eq!(pending.transaction_hash().to_string(), tx_hash());

        let instance = pending.wait().await.unwrap();

        assert_eq!(instance.address().to_string(), CONTRACT);
        assert_eq!(transport.calls_to("eth_getTransactionReceipt").len(), 3);

        let sent = &transport.calls_to("eth_sendTransaction")[0][0];
        assert_eq!(sent["from"], ACCOUNT);
        assert_eq!(sent["gas"], "0x3567e0");
        assert_eq!(sent["data"], "0x6060");
        assert!(sent.get("to").is_none());
    }

    #[tokio::test]
    async fn test_deploy_appends_constructor_arguments() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));

        let params = DeployParams {
            args: vec![Token::Uint(100)],
            ..deploy_params()
        };
        binding(&transport).deploy(params).await.unwrap();

        let sent = &transport.calls_to("eth_sendTransaction")[0][0];
        assert_eq!(sent["data"], format!("0x6060{}64", "00".repeat(31)));
    }

    #[tokio::test]
    async fn test_bad_constructor_arguments_fail_before_rpc() {
        let transport = Arc::new(MockTransport::new());

        let params = DeployParams {
            args: vec![Token::String("100".to_string())],
            ..deploy_params()
        };
        let result = binding(&transport).deploy(params).await;

        assert!(matches!(result, Err(MarketError::Abi { .. })));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_deployment_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));
        transport.on("eth_getTransactionReceipt", |_| {
            Ok(json!({
                "transactionHash": tx_hash(),
                "contractAddress": CONTRACT,
                "status": "0x0"
            }))
        });

        let pending = binding(&transport).deploy(deploy_params()).await.unwrap();
        let err = pending.wait().await.unwrap_err();

        assert!(matches!(err, MarketError::DeploymentReverted { .. }));
    }

    #[tokio::test]
    async fn test_receipt_without_address_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));
        transport.on("eth_getTransactionReceipt", |_| {
            Ok(json!({"transactionHash": tx_hash(), "contractAddress": null}))
        });

        let pending = binding(&transport).deploy(deploy_params()).await.unwrap();
        assert!(matches!(
            pending.poll().await,
            Err(MarketError::MissingContractAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_error_is_returned_unchanged() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| {
            Err(MarketError::Rpc {
                code: -32000,
                message: "exceeds block gas limit".to_string(),
            })
        });

        let err = binding(&transport)
            .deploy(deploy_params())
            .await
            .err()
            .unwrap();

        match err {
            MarketError::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "exceeds block gas limit");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_at_makes_no_rpc_calls() {
        let transport = Arc::new(MockTransport::new());
        let instance = binding(&transport).at(CONTRACT.parse().unwrap());

        assert_eq!(instance.address().to_string(), CONTRACT);
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_call_address_decodes_output() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_call", |_| {
            Ok(json!(format!(
                "0x000000000000000000000000{}",
                &CONTRACT[2..]
            )))
        });

        let instance = binding(&transport)
            .at(Address::new([0x11; 20]))
            .with_sender(Some(ACCOUNT.parse().unwrap()));
        let address = instance.call_address("market").await.unwrap();

        assert_eq!(address.to_string(), CONTRACT);
        let params = &transport.calls_to("eth_call")[0];
        assert_eq!(params[0]["data"], "0x80f55605");
        assert_eq!(params[0]["from"], ACCOUNT);
        assert!(transport.calls_to("eth_accounts").is_empty());
    }

    #[tokio::test]
    async fn test_send_uses_node_account_by_default() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_accounts", |_| Ok(json!([ACCOUNT])));
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));

        let instance = binding(&transport).at(CONTRACT.parse().unwrap());
        let hash = instance
            .send("setUserName", &[Token::String("John Doe".to_string())])
            .await
            .unwrap();

        assert_eq!(hash.to_string(), tx_hash());
        let sent = &transport.calls_to("eth_sendTransaction")[0][0];
        assert_eq!(sent["from"], ACCOUNT);
        assert_eq!(sent["to"], CONTRACT);
        assert!(sent["data"].as_str().unwrap().starts_with("0x2b5914fe"));
        assert!(sent.get("gas").is_none());
    }

    #[tokio::test]
    async fn test_send_with_array_arguments() {
        let transport = Arc::new(MockTransport::new());
        transport.on("eth_sendTransaction", |_| Ok(json!(tx_hash())));
        let requirements_abi: Abi = serde_json::from_value(json!([
            {"type": "function", "name": "setAttributes", "constant": false,
             "inputs": [
                {"name": "names", "type": "bytes32[]"},
                {"name": "types", "type": "uint8[]"},
                {"name": "decimals", "type": "uint8[]"},
                {"name": "mins", "type": "int256[]"},
                {"name": "maxs", "type": "int256[]"}
             ],
             "outputs": []}
        ]))
        .unwrap();

        let instance = ContractBinding::new(requirements_abi, EthClient::new(transport.clone()))
            .at(CONTRACT.parse().unwrap())
            .with_sender(Some(ACCOUNT.parse().unwrap()));
        let uints = |values: &[u128]| Token::Array(values.iter().copied().map(Token::Uint).collect());
        let ints = |values: &[i128]| Token::Array(values.iter().copied().map(Token::Int).collect());
        instance
            .send(
                "setAttributes",
                &[
                    Token::Array(vec![Token::FixedBytes(b"Fat".to_vec())]),
                    uints(&[0]),
                    uints(&[2]),
                    ints(&[330]),
                    ints(&[342]),
                ],
            )
            .await
            .unwrap();

        let data = transport.calls_to("eth_sendTransaction")[0][0]["data"]
            .as_str()
            .unwrap()
            .to_string();
        let selector = Selector::from_signature(
            "setAttributes(bytes32[],uint8[],uint8[],int256[],int256[])",
        );
        assert!(data.starts_with(&selector.to_string()));
        // selector + five offsets + five (length, element) tails
        assert_eq!(data.len(), 2 + 2 * (4 + 15 * 32));
    }

    #[tokio::test]
    async fn test_unknown_function_fails_before_rpc() {
        let transport = Arc::new(MockTransport::new());
        let instance = binding(&transport)
            .at(CONTRACT.parse().unwrap())
            .with_sender(Some(ACCOUNT.parse().unwrap()));

        assert!(instance.call("productCount", &[]).await.is_err());
        assert!(transport.methods().is_empty());
    }
}

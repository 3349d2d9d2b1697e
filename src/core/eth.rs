use crate::domain::model::{Address, Bytes, TransactionReceipt, TransactionRequest, TxHash};
use crate::domain::ports::RpcTransport;
use crate::utils::error::{MarketError, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Typed `eth_*` calls on top of an injected [`RpcTransport`].
#[derive(Clone)]
pub struct EthClient {
    transport: Arc<dyn RpcTransport>,
    default_account: Arc<OnceCell<Address>>,
}

impl EthClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            default_account: Arc::new(OnceCell::new()),
        }
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        let result = self.transport.request("eth_accounts", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// First unlocked account of the node, looked up once per client.
    pub async fn default_account(&self) -> Result<Address> {
        self.default_account
            .get_or_try_init(|| async move {
                let accounts = self.accounts().await?;
                let account = accounts.first().copied().ok_or_else(|| MarketError::MissingConfig {
                    field: "account.from (node reports no accounts)".to_string(),
                })?;
                tracing::debug!("Using node account {} as sender", account);
                Ok::<_, MarketError>(account)
            })
            .await
            .copied()
    }

    pub async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash> {
        let result = self
            .transport
            .request("eth_sendTransaction", json!([request]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        let result = self
            .transport
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn call(&self, request: &TransactionRequest) -> Result<Bytes> {
        let result = self
            .transport
            .request("eth_call", json!([request, "latest"]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory node used by the unit tests of the layers above.

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync>;

    #[derive(Default)]
    pub struct MockTransport {
        handlers: Mutex<Vec<(String, VecDeque<Responder>)>>,
        pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a response; the last one queued for a method keeps
        /// answering once the others are used up.
        pub fn on<F>(&self, method: &str, responder: F) -> &Self
        where
            F: Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
        {
            let mut handlers = self.handlers.lock().unwrap();
            match handlers.iter_mut().find(|(m, _)| m == method) {
                Some((_, queue)) => queue.push_back(Box::new(responder)),
                None => {
                    let mut queue: VecDeque<Responder> = VecDeque::new();
                    queue.push_back(Box::new(responder));
                    handlers.push((method.to_string(), queue));
                }
            }
            self
        }

        pub fn calls_to(&self, method: &str) -> Vec<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, params)| params.clone())
                .collect()
        }

        pub fn methods(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(m, _)| m.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn request(
            &self,
            method: &str,
            params: serde_json::Value,
        ) -> Result<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.clone()));

            let mut handlers = self.handlers.lock().unwrap();
            let queue = handlers
                .iter_mut()
                .find(|(m, _)| m == method)
                .map(|(_, queue)| queue)
                .ok_or_else(|| MarketError::Rpc {
                    code: -32601,
                    message: format!("the method {} does not exist", method),
                })?;

            if queue.len() > 1 {
                let responder = queue.pop_front().unwrap();
                responder(&params)
            } else {
                (queue[0])(&params)
            }
        }
    }
}

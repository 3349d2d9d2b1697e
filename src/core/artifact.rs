use crate::core::abi::Abi;
use crate::domain::model::{decode_hex, Bytes};
use crate::domain::ports::Storage;
use crate::utils::error::{MarketError, Result};
use serde::Deserialize;

/// Compiler output for one contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Option<Bytes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default, alias = "contract_name")]
    contract_name: Option<String>,
    abi: Abi,
    // Truffle 3 的欄位名稱
    #[serde(default, rename = "unlinked_binary")]
    unlinked_binary: Option<String>,
    #[serde(default)]
    bytecode: Option<String>,
}

impl ContractArtifact {
    pub fn from_json(name_hint: &str, content: &[u8]) -> Result<Self> {
        let raw: RawArtifact =
            serde_json::from_slice(content).map_err(|e| MarketError::Artifact {
                contract: name_hint.to_string(),
                message: format!("invalid artifact JSON: {}", e),
            })?;

        let contract_name = raw
            .contract_name
            .unwrap_or_else(|| name_hint.to_string());

        let bytecode = match raw.unlinked_binary.or(raw.bytecode) {
            Some(code) if code.contains("__") => {
                return Err(MarketError::Artifact {
                    contract: contract_name,
                    message: "bytecode has unlinked library references".to_string(),
                });
            }
            Some(code) => {
                let bytes = decode_hex(&code).map_err(|e| MarketError::Artifact {
                    contract: contract_name.clone(),
                    message: format!("invalid bytecode: {}", e),
                })?;
                (!bytes.is_empty()).then_some(Bytes(bytes))
            }
            None => None,
        };

        Ok(Self {
            contract_name,
            abi: raw.abi,
            bytecode,
        })
    }

    pub fn require_bytecode(&self) -> Result<&Bytes> {
        self.bytecode.as_ref().ok_or_else(|| MarketError::Artifact {
            contract: self.contract_name.clone(),
            message: "artifact has no deployable bytecode".to_string(),
        })
    }
}

/// Loads artifacts through a [`Storage`] backend.
pub struct ArtifactLoader<S: Storage> {
    storage: S,
}

impl<S: Storage> ArtifactLoader<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn load(&self, path: &str) -> Result<ContractArtifact> {
        tracing::debug!("Loading contract artifact from {}", path);
        let content = self.storage.read_file(path).await?;

        let name_hint = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path);
        let artifact = ContractArtifact::from_json(name_hint, &content)?;

        tracing::debug!(
            "Loaded {} ({} ABI entries, {} bytes of bytecode)",
            artifact.contract_name,
            artifact.abi.entries.len(),
            artifact.bytecode.as_ref().map_or(0, Bytes::len)
        );
        Ok(artifact)
    }

    /// Market and factory artifacts, in that order.
    pub async fn load_pair(
        &self,
        market_path: &str,
        factory_path: &str,
    ) -> Result<(ContractArtifact, ContractArtifact)> {
        let market = self.load(market_path).await?;
        let factory = self.load(factory_path).await?;
        factory.require_bytecode()?;
        Ok((market, factory))
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("RPC transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid hex value: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Artifact error for {contract}: {message}")]
    Artifact { contract: String, message: String },

    #[error("ABI error: {message}")]
    Abi { message: String },

    #[error("Deployment transaction {tx_hash} was reverted")]
    DeploymentReverted { tx_hash: String },

    #[error("Transaction {tx_hash} was mined without a contract address")]
    MissingContractAddress { tx_hash: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Node,
    Contract,
    Configuration,
    Data,
}

impl MarketError {
    pub fn abi(message: impl Into<String>) -> Self {
        MarketError::Abi {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MarketError::Transport(_) => ErrorCategory::Network,
            MarketError::Rpc { .. } => ErrorCategory::Node,
            MarketError::DeploymentReverted { .. }
            | MarketError::MissingContractAddress { .. }
            | MarketError::Abi { .. } => ErrorCategory::Contract,
            MarketError::Config { .. }
            | MarketError::InvalidConfigValue { .. }
            | MarketError::MissingConfig { .. }
            | MarketError::Artifact { .. } => ErrorCategory::Configuration,
            MarketError::Io(_) | MarketError::Serialization(_) | MarketError::InvalidHex(_) => {
                ErrorCategory::Data
            }
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the Ethereum node: {}", self),
            ErrorCategory::Node => format!("The Ethereum node rejected the request: {}", self),
            ErrorCategory::Contract => format!("Contract interaction failed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Data => format!("Could not process data: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the node is running and rpc.endpoint is correct",
            ErrorCategory::Node => "Check that the sending account is unlocked and funded",
            ErrorCategory::Contract => "Verify the contract address and the compiled artifacts",
            ErrorCategory::Configuration => "Review the configuration file and artifact paths",
            ErrorCategory::Data => "Inspect the node response with --verbose",
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

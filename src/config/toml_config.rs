use crate::domain::model::Address;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RPC_ENDPOINT: &str = "http://localhost:8545";
pub const DEFAULT_MARKET_ARTIFACT: &str = "build/contracts/Market.json";
pub const DEFAULT_FACTORY_ARTIFACT: &str = "build/contracts/MarketFactory.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 未設定時使用節點的第一個帳號
    pub from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// 相對路徑以此目錄為基準
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    #[serde(default = "default_market_artifact")]
    pub market: String,
    #[serde(default = "default_factory_artifact")]
    pub market_factory: String,
}

fn default_endpoint() -> String {
    DEFAULT_RPC_ENDPOINT.to_string()
}

fn default_base_dir() -> String {
    ".".to_string()
}

fn default_market_artifact() -> String {
    DEFAULT_MARKET_ARTIFACT.to_string()
}

fn default_factory_artifact() -> String {
    DEFAULT_FACTORY_ARTIFACT.to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: None,
            poll_interval_ms: None,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            market: default_market_artifact(),
            market_factory: default_factory_artifact(),
        }
    }
}

impl ClientConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MarketError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RPC_URL})，未定義的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MarketError::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_rpc_endpoint("rpc.endpoint", &self.rpc.endpoint)?;

        if let Some(timeout) = self.rpc.timeout_seconds {
            validation::validate_at_least("rpc.timeout_seconds", timeout, 1)?;
        }
        if let Some(interval) = self.rpc.poll_interval_ms {
            validation::validate_at_least("rpc.poll_interval_ms", interval, 1)?;
        }

        self.sender()?;

        if self.artifacts.base_dir.is_empty() {
            return Err(MarketError::MissingConfig {
                field: "artifacts.base_dir".to_string(),
            });
        }
        validation::validate_artifact_path("artifacts.market", &self.artifacts.market)?;
        validation::validate_artifact_path("artifacts.market_factory", &self.artifacts.market_factory)?;

        Ok(())
    }
}

impl ConfigProvider for ClientConfig {
    fn rpc_endpoint(&self) -> &str {
        &self.rpc.endpoint
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_seconds.unwrap_or(30))
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc.poll_interval_ms.unwrap_or(500))
    }

    fn sender(&self) -> Result<Option<Address>> {
        self.account
            .from
            .as_deref()
            .map(|from| validation::validate_address("account.from", from))
            .transpose()
    }

    fn artifact_base_dir(&self) -> &str {
        &self.artifacts.base_dir
    }

    fn market_artifact_path(&self) -> &str {
        &self.artifacts.market
    }

    fn factory_artifact_path(&self) -> &str {
        &self.artifacts.market_factory
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[rpc]
endpoint = "http://127.0.0.1:7545"
timeout_seconds = 10
poll_interval_ms = 250

[account]
from = "0x627306090abab3a6e1400e9345bc60c78a8bef57"

[artifacts]
base_dir = "/srv/market"
market = "contracts/Market.json"
market_factory = "contracts/MarketFactory.json"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.rpc_endpoint(), "http://127.0.0.1:7545");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            config.sender().unwrap().unwrap().to_string(),
            "0x627306090abab3a6e1400e9345bc60c78a8bef57"
        );
        assert_eq!(config.artifact_base_dir(), "/srv/market");
        assert_eq!(config.factory_artifact_path(), "contracts/MarketFactory.json");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_defaults_follow_truffle_layout() {
        let config = ClientConfig::from_toml_str("").unwrap();

        assert_eq!(config.rpc_endpoint(), DEFAULT_RPC_ENDPOINT);
        assert_eq!(config.market_artifact_path(), "build/contracts/Market.json");
        assert_eq!(
            config.factory_artifact_path(),
            "build/contracts/MarketFactory.json"
        );
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.sender().unwrap().is_none());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MARKET_CLIENT_TEST_RPC", "https://rpc.test.net");

        let toml_content = r#"
[rpc]
endpoint = "${MARKET_CLIENT_TEST_RPC}"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.rpc.endpoint, "https://rpc.test.net");

        std::env::remove_var("MARKET_CLIENT_TEST_RPC");
    }

    #[test]
    fn test_config_validation() {
        let bad_endpoint = ClientConfig::from_toml_str("[rpc]\nendpoint = \"localhost\"").unwrap();
        assert_err!(bad_endpoint.validate());

        let bad_sender = ClientConfig::from_toml_str("[account]\nfrom = \"0x1234\"").unwrap();
        assert_err!(bad_sender.validate());

        let bad_artifact =
            ClientConfig::from_toml_str("[artifacts]\nmarket = \"Market.sol\"").unwrap();
        assert_err!(bad_artifact.validate());

        let zero_poll = ClientConfig::from_toml_str("[rpc]\npoll_interval_ms = 0").unwrap();
        assert_err!(zero_poll.validate());

        let no_base_dir = ClientConfig::from_toml_str("[artifacts]\nbase_dir = \"\"").unwrap();
        assert!(matches!(
            no_base_dir.validate(),
            Err(MarketError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_mistyped_sender_is_rejected() {
        // 39 hex digits
        let config = ClientConfig::from_toml_str(
            "[account]\nfrom = \"0xf17f52151ebef6c7334fad080c5704d77216b73\"",
        )
        .unwrap();

        match config.sender() {
            Err(MarketError::InvalidConfigValue { field, .. }) => assert_eq!(field, "account.from"),
            other => panic!("unexpected sender: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml() {
        let err = ClientConfig::from_toml_str("[rpc\nendpoint = 1").unwrap_err();
        assert!(matches!(err, MarketError::Config { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[rpc]\nendpoint = \"http://node:8545\"\n")
            .unwrap();

        let config = ClientConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.rpc_endpoint(), "http://node:8545");
    }
}

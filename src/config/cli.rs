use crate::config::toml_config::ClientConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "market-client")]
#[command(about = "Deploy and inspect marketplace contracts")]
pub struct CliConfig {
    #[arg(long, short, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Override rpc.endpoint")]
    pub rpc_url: Option<String>,

    #[arg(long, help = "Override account.from")]
    pub from: Option<String>,

    #[arg(long, help = "Override artifacts.base_dir")]
    pub artifacts_dir: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy a new MarketFactory and print the market it creates
    Create,
    /// Show product and requirements counts of an existing market
    Info {
        /// Market contract address
        address: String,
    },
}

impl CliConfig {
    /// 讀取設定檔後套用命令列覆寫，最後驗證
    pub fn resolve(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };

        if let Some(rpc_url) = &self.rpc_url {
            config.rpc.endpoint = rpc_url.clone();
        }
        if let Some(from) = &self.from {
            config.account.from = Some(from.clone());
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts.base_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ConfigProvider;

    #[test]
    fn test_parse_create() {
        let cli = CliConfig::parse_from(["market-client", "--rpc-url", "http://node:8545", "create"]);

        assert!(matches!(cli.command, Command::Create));
        let config = cli.resolve().unwrap();
        assert_eq!(config.rpc_endpoint(), "http://node:8545");
    }

    #[test]
    fn test_parse_info_with_overrides() {
        let cli = CliConfig::parse_from([
            "market-client",
            "--from",
            "0x627306090abab3a6e1400e9345bc60c78a8bef57",
            "--artifacts-dir",
            "/srv/market",
            "info",
            "0xf25186b5081ff5ce73482ad761db0eb0d25abfbf",
        ]);

        match &cli.command {
            Command::Info { address } => {
                assert_eq!(address, "0xf25186b5081ff5ce73482ad761db0eb0d25abfbf")
            }
            other => panic!("unexpected command: {:?}", other),
        }
        let config = cli.resolve().unwrap();
        assert!(config.sender().unwrap().is_some());
        assert_eq!(config.artifact_base_dir(), "/srv/market");
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let cli = CliConfig::parse_from(["market-client", "--rpc-url", "not a url", "create"]);
        assert!(cli.resolve().is_err());
    }
}

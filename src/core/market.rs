use crate::core::abi::{bytes32_to_string, Token};
use crate::core::binding::ContractInstance;
use crate::domain::model::{Address, TxHash};
use crate::utils::error::{MarketError, Result};

/// Handle to one deployed `Market` contract. All state lives on-chain;
/// every method is a single delegated call.
#[derive(Debug, Clone)]
pub struct Market {
    contract: ContractInstance,
}

fn expect_uint(function: &str, token: Token) -> Result<u128> {
    token
        .into_uint()
        .ok_or_else(|| MarketError::abi(format!("{} did not return an integer", function)))
}

fn expect_address(function: &str, token: Token) -> Result<Address> {
    token
        .into_address()
        .ok_or_else(|| MarketError::abi(format!("{} did not return an address", function)))
}

impl Market {
    pub fn new(contract: ContractInstance) -> Self {
        Self { contract }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &ContractInstance {
        &self.contract
    }

    pub async fn call(&self, function: &str, args: &[Token]) -> Result<Vec<Token>> {
        self.contract.call(function, args).await
    }

    pub async fn send(&self, function: &str, args: &[Token]) -> Result<TxHash> {
        self.contract.send(function, args).await
    }

    async fn uint(&self, function: &str, args: &[Token]) -> Result<u128> {
        expect_uint(function, self.contract.call_single(function, args).await?)
    }

    async fn address_of(&self, function: &str, args: &[Token]) -> Result<Address> {
        expect_address(function, self.contract.call_single(function, args).await?)
    }

    pub async fn product_count(&self) -> Result<u128> {
        self.uint("productCount", &[]).await
    }

    /// Address of the `Offer` contract registered at `index`.
    pub async fn product_at(&self, index: u128) -> Result<Address> {
        self.address_of("productAt", &[Token::Uint(index)]).await
    }

    pub async fn requirements_count(&self) -> Result<u128> {
        self.uint("requirementsCount", &[]).await
    }

    pub async fn requirements_at(&self, index: u128) -> Result<Address> {
        self.address_of("requirementsAt", &[Token::Uint(index)])
            .await
    }

    pub async fn requirements_by_name(&self, name: &str) -> Result<Address> {
        self.address_of("getRequirementsByName", &[Token::String(name.to_string())])
            .await
    }

    pub async fn token(&self) -> Result<Address> {
        self.address_of("token", &[]).await
    }

    /// Profile contract of the calling account.
    pub async fn my_profile(&self) -> Result<Address> {
        self.address_of("getMyProfile", &[]).await
    }

    pub async fn set_user_name(&self, name: &str) -> Result<TxHash> {
        self.send("setUserName", &[Token::String(name.to_string())])
            .await
    }
}

/// Profile names are stored as `bytes32`.
pub fn profile_name(token: Token) -> Result<String> {
    match token {
        Token::FixedBytes(bytes) => Ok(bytes32_to_string(&bytes)),
        Token::String(s) => Ok(s),
        other => Err(MarketError::abi(format!(
            "profile name has unexpected type: {:?}",
            other
        ))),
    }
}

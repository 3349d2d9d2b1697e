pub mod abi;
pub mod artifact;
pub mod binding;
pub mod eth;
pub mod market;
pub mod repository;

pub use crate::domain::model::{Address, TxHash};
pub use crate::domain::ports::{ConfigProvider, RpcTransport, Storage};
pub use crate::utils::error::Result;

use crate::domain::model::Address;
use crate::utils::error::{MarketError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> MarketError {
    MarketError::InvalidConfigValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 節點只走 HTTP JSON-RPC，ws/ipc 不支援
pub fn validate_rpc_endpoint(field: &str, endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| invalid(field, endpoint, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(
            field,
            endpoint,
            format!("expected an http(s) JSON-RPC endpoint, got {}://", scheme),
        )),
    }
}

/// Artifacts are Truffle build outputs, always `.json`.
pub fn validate_artifact_path(field: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field, path, "path cannot be empty"));
    }

    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(()),
        _ => Err(invalid(field, path, "expected a compiled .json artifact")),
    }
}

pub fn validate_at_least(field: &str, value: u64, min: u64) -> Result<()> {
    if value < min {
        return Err(invalid(field, value, format!("must be at least {}", min)));
    }
    Ok(())
}

pub fn validate_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|e| invalid(field, value, e.to_string()))
}

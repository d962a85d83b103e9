//! Error types for Scout Core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoutError {
    /// The aggregation step itself failed; per-facet upstream failures never end up here.
    #[error("Wallet check failed for {address}: {reason}")]
    WalletCheckFailed { address: String, reason: String },
}

impl ScoutError {
    pub fn wallet_check_failed(address: impl Into<String>, reason: impl ToString) -> Self {
        ScoutError::WalletCheckFailed {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

pub type ScoutResult<T> = Result<T, ScoutError>;

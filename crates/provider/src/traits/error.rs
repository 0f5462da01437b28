// This file is part of Opline.
//
// Opline is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opline is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opline.
// If not, see https://www.gnu.org/licenses/.

use std::fmt::{Display, Formatter};

use alloy_contract::Error as ContractError;
use alloy_primitives::Bytes;
use alloy_sol_types::{Revert, SolError};
use alloy_transport::TransportError;

/// Result of a provider method call
pub type ProviderResult<T> = Result<T, ProviderError>;

/// The raw payload of an on-chain revert, with a best-effort decoded reason
#[derive(Clone, Debug)]
pub struct RevertData {
    /// The raw revert bytes
    pub raw: Bytes,
    /// The revert reason, if the payload decodes as `Error(string)`
    pub decoded: Option<String>,
}

impl RevertData {
    /// Create a new revert data wrapper, decoding the reason if possible
    pub fn new(raw: Bytes) -> Self {
        let decoded = Revert::abi_decode(&raw, false).ok().map(|r| r.reason);
        Self { raw, decoded }
    }
}

impl Display for RevertData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.decoded {
            Some(reason) => write!(f, "{reason}"),
            None => write!(f, "{}", self.raw),
        }
    }
}

/// Error enumeration for the provider traits
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure talking to the node
    #[error("transport error: {0}")]
    Transport(String),
    /// A response could not be decoded against the expected ABI
    #[error("decode error: {0}")]
    Decode(String),
    /// The call reverted on chain
    #[error("call reverted: {0}")]
    Revert(RevertData),
    /// Internal errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<TransportError> for ProviderError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ErrorResp(resp) => match resp.as_revert_data() {
                Some(raw) => ProviderError::Revert(RevertData::new(raw)),
                None => ProviderError::Transport(resp.to_string()),
            },
            err => ProviderError::Transport(err.to_string()),
        }
    }
}

impl From<ContractError> for ProviderError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::TransportError(err) => err.into(),
            err => ProviderError::Decode(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolValue;

    use super::*;

    #[test]
    fn test_revert_data_decodes_error_string() {
        let raw = Bytes::from(
            [
                Revert::SELECTOR.to_vec(),
                ("AA23 reverted".to_string(),).abi_encode(),
            ]
            .concat(),
        );
        let revert = RevertData::new(raw);
        assert_eq!(revert.decoded.as_deref(), Some("AA23 reverted"));
        assert_eq!(revert.to_string(), "AA23 reverted");
    }

    #[test]
    fn test_revert_data_keeps_raw_on_unknown_payload() {
        let revert = RevertData::new(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]));
        assert!(revert.decoded.is_none());
        assert_eq!(revert.to_string(), "0xdeadbeef");
    }
}

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

//! Trait for interacting with chain data.

use alloy_primitives::Bytes;
use alloy_rpc_types_eth::{
    state::StateOverride, BlockId, BlockNumberOrTag, FeeHistory, TransactionRequest,
};
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::error::ProviderResult;

/// Header fields of the latest block that fee estimation needs
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockFees {
    /// The base fee per gas, absent on chains without EIP-1559
    pub base_fee_per_gas: Option<u128>,
    /// Gas used by the block
    pub gas_used: u128,
    /// Gas limit of the block
    pub gas_limit: u128,
}

/// Trait for interacting with chain data.
///
/// This is the only place the core talks JSON-RPC. It owns transport and ABI
/// (de)serialization and no policy.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait::async_trait]
pub trait EvmProvider: Send + Sync {
    /// Simulate a transaction via an `eth_call` with optional state overrides
    async fn call(
        &self,
        tx: &TransactionRequest,
        block: Option<BlockId>,
        state_overrides: &StateOverride,
    ) -> ProviderResult<Bytes>;

    /// Get the fee-relevant header fields of the latest block
    async fn get_latest_block_fees(&self) -> ProviderResult<BlockFees>;

    /// Get fee history given a number of blocks and reward percentiles
    async fn fee_history(
        &self,
        block_count: u64,
        block_number: BlockNumberOrTag,
        reward_percentiles: &[f64],
    ) -> ProviderResult<FeeHistory>;

    /// Get the gas price as reported by the node's RPC
    async fn gas_price(&self) -> ProviderResult<u128>;

    /// Get the max priority fee per gas as reported by the node's RPC
    async fn get_max_priority_fee(&self) -> ProviderResult<u128>;
}

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

use std::marker::PhantomData;

use alloy_primitives::Bytes;
use alloy_provider::Provider as AlloyProvider;
use alloy_rpc_types_eth::{
    state::StateOverride, BlockId, BlockNumberOrTag, BlockTransactionsKind, FeeHistory,
    TransactionRequest,
};
use alloy_transport::Transport;
use anyhow::Context;

use crate::{BlockFees, EvmProvider, ProviderResult};

/// [`EvmProvider`] implementation backed by an alloy provider
#[derive(Clone, Debug)]
pub struct AlloyEvmProvider<AP, T> {
    inner: AP,
    _transport: PhantomData<T>,
}

impl<AP, T> AlloyEvmProvider<AP, T> {
    /// Create a new `AlloyEvmProvider`
    pub fn new(inner: AP) -> Self {
        Self {
            inner,
            _transport: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<AP, T> EvmProvider for AlloyEvmProvider<AP, T>
where
    T: Transport + Clone,
    AP: AlloyProvider<T>,
{
    async fn call(
        &self,
        tx: &TransactionRequest,
        block: Option<BlockId>,
        state_overrides: &StateOverride,
    ) -> ProviderResult<Bytes> {
        let mut call = self.inner.call(tx).overrides(state_overrides);
        if let Some(block) = block {
            call = call.block(block);
        }
        Ok(call.await?)
    }

    async fn get_latest_block_fees(&self) -> ProviderResult<BlockFees> {
        let block = self
            .inner
            .get_block(BlockId::latest(), BlockTransactionsKind::Hashes)
            .await?
            .context("latest block should exist")?;
        Ok(BlockFees {
            base_fee_per_gas: block.header.base_fee_per_gas.map(u128::from),
            gas_used: u128::from(block.header.gas_used),
            gas_limit: u128::from(block.header.gas_limit),
        })
    }

    async fn fee_history(
        &self,
        block_count: u64,
        block_number: BlockNumberOrTag,
        reward_percentiles: &[f64],
    ) -> ProviderResult<FeeHistory> {
        Ok(self
            .inner
            .get_fee_history(block_count, block_number, reward_percentiles)
            .await?)
    }

    async fn gas_price(&self) -> ProviderResult<u128> {
        Ok(self.inner.get_gas_price().await?)
    }

    async fn get_max_priority_fee(&self) -> ProviderResult<u128> {
        Ok(self.inner.get_max_priority_fee_per_gas().await?)
    }
}

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

use std::sync::Arc;

use alloy_rpc_types_eth::BlockNumberOrTag;
use anyhow::Context;
use async_trait::async_trait;
use opline_provider::EvmProvider;
use opline_types::GasFees;

const FEE_HISTORY_BLOCKS: u64 = 10;
const FEE_HISTORY_PERCENTILE: f64 = 20.0;

// When the node reports a zero priority fee, suggest this fraction of the max
// fee instead so the operation is not priced out of blocks entirely.
const ZERO_PRIORITY_FEE_DIVISOR: u128 = 200;

/// A source of fee suggestions. The gas price manager tries its sources in
/// order and falls through on failure.
#[async_trait]
pub(crate) trait FeeSource: Send + Sync {
    async fn estimate_fees(&self) -> anyhow::Result<GasFees>;
}

/// Fee source for EIP-1559 chains: takes the next block's base fee from the
/// fee history and asks the node for a priority fee suggestion.
pub(crate) struct Eip1559FeeSource<P> {
    provider: Arc<P>,
}

impl<P> Eip1559FeeSource<P> {
    pub(crate) fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

impl<P: EvmProvider> Eip1559FeeSource<P> {
    async fn next_base_fee(&self) -> anyhow::Result<u128> {
        self.provider
            .fee_history(1, BlockNumberOrTag::Latest, &[])
            .await?
            .next_block_base_fee()
            .context("chain reports no base fee, EIP-1559 unsupported")
    }

    // Average of the 20th percentile rewards over the last blocks, skipping
    // blocks with no reward data.
    async fn average_reward(&self) -> anyhow::Result<u128> {
        let fee_history = self
            .provider
            .fee_history(
                FEE_HISTORY_BLOCKS,
                BlockNumberOrTag::Latest,
                &[FEE_HISTORY_PERCENTILE],
            )
            .await?;
        let Some(reward) = fee_history.reward else {
            return Ok(0);
        };
        let values = reward
            .iter()
            .filter(|block| !block.is_empty() && block[0] != 0)
            .map(|block| block[0])
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Ok(0);
        }
        Ok(values.iter().sum::<u128>() / values.len() as u128)
    }
}

#[async_trait]
impl<P: EvmProvider> FeeSource for Eip1559FeeSource<P> {
    async fn estimate_fees(&self) -> anyhow::Result<GasFees> {
        let next_base_fee = self.next_base_fee().await?;

        let mut priority_fee = match self.provider.get_max_priority_fee().await {
            Ok(fee) => fee,
            Err(err) => {
                tracing::debug!(
                    "eth_maxPriorityFeePerGas unavailable, falling back to fee history: {err:#}"
                );
                self.average_reward().await?.min(next_base_fee)
            }
        };

        let max_fee = next_base_fee.saturating_add(priority_fee);
        if priority_fee == 0 {
            priority_fee = max_fee / ZERO_PRIORITY_FEE_DIVISOR;
        }

        Ok(GasFees {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

/// Fee source for chains without EIP-1559 support: `eth_gasPrice` fills both
/// fee components.
pub(crate) struct LegacyFeeSource<P> {
    provider: Arc<P>,
}

impl<P> LegacyFeeSource<P> {
    pub(crate) fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: EvmProvider> FeeSource for LegacyFeeSource<P> {
    async fn estimate_fees(&self) -> anyhow::Result<GasFees> {
        let gas_price = self.provider.gas_price().await?;
        Ok(GasFees {
            max_fee_per_gas: gas_price,
            max_priority_fee_per_gas: gas_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_rpc_types_eth::FeeHistory;
    use opline_provider::{MockEvmProvider, ProviderError};

    use super::*;

    const GWEI: u128 = 1_000_000_000;

    // eth_feeHistory returns block_count + 1 base fees, the last being the
    // next block's.
    fn expect_next_base_fee(provider: &mut MockEvmProvider, base_fee: u128) {
        provider
            .expect_fee_history()
            .withf(|_, _, percentiles| percentiles.is_empty())
            .returning(move |_, _, _| {
                Ok(FeeHistory {
                    base_fee_per_gas: vec![base_fee - 1, base_fee],
                    ..Default::default()
                })
            });
    }

    #[tokio::test]
    async fn test_eip1559_source_with_node_priority_fee() {
        let mut provider = MockEvmProvider::default();
        expect_next_base_fee(&mut provider, 100 * GWEI);
        provider
            .expect_get_max_priority_fee()
            .returning(|| Ok(2 * GWEI));

        let fees = Eip1559FeeSource::new(Arc::new(provider))
            .estimate_fees()
            .await
            .unwrap();
        assert_eq!(fees.max_fee_per_gas, 102 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 2 * GWEI);
    }

    #[tokio::test]
    async fn test_eip1559_source_falls_back_to_fee_history() {
        let mut provider = MockEvmProvider::default();
        expect_next_base_fee(&mut provider, 100 * GWEI);
        provider
            .expect_get_max_priority_fee()
            .returning(|| Err(ProviderError::Transport("method not found".to_string())));
        provider
            .expect_fee_history()
            .withf(|_, _, percentiles| !percentiles.is_empty())
            .returning(|_, _, _| {
                Ok(FeeHistory {
                    reward: Some(vec![vec![GWEI], vec![3 * GWEI], vec![], vec![0]]),
                    ..Default::default()
                })
            });

        let fees = Eip1559FeeSource::new(Arc::new(provider))
            .estimate_fees()
            .await
            .unwrap();
        // average of the non-empty, non-zero rewards
        assert_eq!(fees.max_priority_fee_per_gas, 2 * GWEI);
        assert_eq!(fees.max_fee_per_gas, 102 * GWEI);
    }

    #[tokio::test]
    async fn test_eip1559_source_zero_priority_fee() {
        let mut provider = MockEvmProvider::default();
        expect_next_base_fee(&mut provider, 100 * GWEI);
        provider.expect_get_max_priority_fee().returning(|| Ok(0));

        let fees = Eip1559FeeSource::new(Arc::new(provider))
            .estimate_fees()
            .await
            .unwrap();
        assert_eq!(fees.max_fee_per_gas, 100 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 100 * GWEI / 200);
    }

    #[tokio::test]
    async fn test_eip1559_source_requires_base_fee() {
        let mut provider = MockEvmProvider::default();
        provider
            .expect_fee_history()
            .returning(|_, _, _| Ok(FeeHistory::default()));

        Eip1559FeeSource::new(Arc::new(provider))
            .estimate_fees()
            .await
            .expect_err("should fail without a base fee");
    }

    #[tokio::test]
    async fn test_legacy_source() {
        let mut provider = MockEvmProvider::default();
        provider.expect_gas_price().returning(|| Ok(5 * GWEI));

        let fees = LegacyFeeSource::new(Arc::new(provider))
            .estimate_fees()
            .await
            .unwrap();
        assert_eq!(fees.max_fee_per_gas, 5 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 5 * GWEI);
    }
}

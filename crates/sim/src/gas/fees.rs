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

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use opline_provider::EvmProvider;
use opline_types::{
    chain::{ChainSpec, FeeProfile},
    GasFees,
};
use parking_lot::Mutex;

use super::{
    oracle::{Eip1559FeeSource, FeeSource, LegacyFeeSource},
    polygon::{GasCategory, GasStationFeeSource},
};

/// Default number of seconds fee observations stay relevant, and with one
/// observation kept per second, the capacity of the rolling minimum queues.
pub const DEFAULT_GAS_PRICE_TIME_VALIDITY_SECONDS: u32 = 10;

/// Error produced when validating client-submitted fees
#[derive(Debug, thiserror::Error)]
pub enum GasPriceError {
    /// The submitted max fee is below the tracked minimum
    #[error("maxFeePerGas too low, minimum needed: {minimum}, got: {submitted}")]
    MaxFeePerGasTooLow {
        /// The submitted max fee per gas
        submitted: u128,
        /// The minimum acceptable max fee per gas
        minimum: u128,
    },
    /// The submitted priority fee is below the tracked minimum
    #[error("maxPriorityFeePerGas too low, minimum needed: {minimum}, got: {submitted}")]
    MaxPriorityFeePerGasTooLow {
        /// The submitted max priority fee per gas
        submitted: u128,
        /// The minimum acceptable max priority fee per gas
        minimum: u128,
    },
    /// No fee observations were available, even after priming
    #[error("no fee observations available within the validity window")]
    NoObservations,
    /// Fee estimation itself failed
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GasPriceError {
    /// True for failures of the estimation machinery rather than a
    /// violation by the submitted fees
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::NoObservations | Self::Other(_))
    }
}

/// Produces fee suggestions for the chain and validates client-submitted
/// fees against the minimum suggested over a sliding window.
///
/// Estimated fees pass through the chain's [`FeeProfile`]: the priority fee
/// is raised to the chain minimum, both fees are bumped by the chain's
/// percentage, and chain floors are applied. Every suggestion is recorded in
/// two rolling queues holding the per-second minimum of each fee component.
pub struct GasPriceManager {
    profile: FeeProfile,
    sources: Vec<Box<dyn FeeSource>>,
    min_max_fees: Mutex<MinFeeQueue>,
    min_priority_fees: Mutex<MinFeeQueue>,
}

impl GasPriceManager {
    /// Create a new gas price manager for the given chain.
    ///
    /// `time_validity_seconds` bounds how long a recorded fee observation
    /// keeps justifying client-submitted fees.
    pub fn new<P: EvmProvider + 'static>(
        provider: Arc<P>,
        chain_spec: &ChainSpec,
        time_validity_seconds: u32,
    ) -> Self {
        let profile = chain_spec.fee_profile();
        let mut sources: Vec<Box<dyn FeeSource>> = vec![];
        if let Some(url) = profile.gas_station_url {
            sources.push(Box::new(
                GasStationFeeSource::new(url).category(GasCategory::Fast),
            ));
        }
        if chain_spec.supports_eip1559 {
            sources.push(Box::new(Eip1559FeeSource::new(provider)));
        } else {
            sources.push(Box::new(LegacyFeeSource::new(provider)));
        }
        Self::with_sources(profile, sources, time_validity_seconds)
    }

    pub(crate) fn with_sources(
        profile: FeeProfile,
        sources: Vec<Box<dyn FeeSource>>,
        time_validity_seconds: u32,
    ) -> Self {
        let capacity = time_validity_seconds as usize;
        Self {
            profile,
            sources,
            min_max_fees: Mutex::new(MinFeeQueue::new(capacity)),
            min_priority_fees: Mutex::new(MinFeeQueue::new(capacity)),
        }
    }

    /// Returns the suggested fees for the chain and records them in the
    /// rolling minimum queues.
    pub async fn get_gas_price(&self) -> Result<GasFees, GasPriceError> {
        let fees = self.estimate().await?;
        let fees = self.apply_profile(fees);
        self.record(fees, now_millis());
        Ok(fees)
    }

    /// Validates client-submitted fees against the minimum fees suggested
    /// within the time validity window. Queues are primed with a fresh
    /// estimate when cold.
    pub async fn validate_gas_price(&self, submitted: GasFees) -> Result<(), GasPriceError> {
        let (min_max_fee, min_priority_fee) = match self.tracked_minimums() {
            (Some(max_fee), Some(priority_fee)) => (max_fee, priority_fee),
            _ => {
                self.get_gas_price().await?;
                match self.tracked_minimums() {
                    (Some(max_fee), Some(priority_fee)) => (max_fee, priority_fee),
                    _ => return Err(GasPriceError::NoObservations),
                }
            }
        };

        if submitted.max_fee_per_gas < min_max_fee {
            return Err(GasPriceError::MaxFeePerGasTooLow {
                submitted: submitted.max_fee_per_gas,
                minimum: min_max_fee,
            });
        }
        if submitted.max_priority_fee_per_gas < min_priority_fee {
            return Err(GasPriceError::MaxPriorityFeePerGasTooLow {
                submitted: submitted.max_priority_fee_per_gas,
                minimum: min_priority_fee,
            });
        }
        Ok(())
    }

    // Try the sources in order; a failed source falls through to the next.
    async fn estimate(&self) -> Result<GasFees, GasPriceError> {
        let mut last_error = None;
        for (index, source) in self.sources.iter().enumerate() {
            match source.estimate_fees().await {
                Ok(fees) => return Ok(fees),
                Err(err) => {
                    if index + 1 < self.sources.len() {
                        tracing::warn!("fee source failed, falling through: {err:#}");
                    }
                    last_error = Some(err);
                }
            }
        }
        Err(GasPriceError::Other(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("no fee sources configured")
        })))
    }

    fn apply_profile(&self, mut fees: GasFees) -> GasFees {
        fees.max_priority_fee_per_gas = fees
            .max_priority_fee_per_gas
            .max(self.profile.min_priority_fee);
        fees.max_fee_per_gas = fees.max_fee_per_gas.max(fees.max_priority_fee_per_gas);

        let mut fees = fees.scale_by_percent(self.profile.bump_percent);
        if self.profile.collapse_to_max {
            let collapsed = fees.max_fee_per_gas.max(fees.max_priority_fee_per_gas);
            fees.max_fee_per_gas = collapsed;
            fees.max_priority_fee_per_gas = collapsed;
        }

        fees.max_fee_per_gas = fees.max_fee_per_gas.max(self.profile.max_fee_floor);
        fees.max_priority_fee_per_gas = fees
            .max_priority_fee_per_gas
            .max(self.profile.priority_fee_floor);
        fees
    }

    fn record(&self, fees: GasFees, at_millis: u64) {
        self.min_max_fees
            .lock()
            .observe(fees.max_fee_per_gas, at_millis);
        self.min_priority_fees
            .lock()
            .observe(fees.max_priority_fee_per_gas, at_millis);
    }

    fn tracked_minimums(&self) -> (Option<u128>, Option<u128>) {
        (
            self.min_max_fees.lock().min(),
            self.min_priority_fees.lock().min(),
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct FeeObservation {
    at_millis: u64,
    fee: u128,
}

/// Bounded queue holding the minimum fee observed per second.
///
/// Observations landing within the same second as the tail coalesce into the
/// tail, keeping its lowest fee. Once the queue is full the oldest second is
/// evicted.
#[derive(Debug)]
struct MinFeeQueue {
    entries: VecDeque<FeeObservation>,
    capacity: usize,
}

impl MinFeeQueue {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn observe(&mut self, fee: u128, at_millis: u64) {
        match self.entries.back_mut() {
            None => self.entries.push_back(FeeObservation { at_millis, fee }),
            Some(tail) if at_millis.saturating_sub(tail.at_millis) >= 1000 => {
                self.entries.push_back(FeeObservation { at_millis, fee });
                if self.entries.len() > self.capacity {
                    self.entries.pop_front();
                }
            }
            Some(tail) if fee < tail.fee => {
                *tail = FeeObservation { at_millis, fee };
            }
            Some(_) => {}
        }
    }

    fn min(&self) -> Option<u128> {
        self.entries.iter().map(|entry| entry.fee).min()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be after epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use opline_types::chain::{fee_profile, id};

    use super::*;

    const GWEI: u128 = 1_000_000_000;

    struct ConstantFeeSource(GasFees);

    #[async_trait]
    impl FeeSource for ConstantFeeSource {
        async fn estimate_fees(&self) -> anyhow::Result<GasFees> {
            Ok(self.0)
        }
    }

    struct FailingFeeSource;

    #[async_trait]
    impl FeeSource for FailingFeeSource {
        async fn estimate_fees(&self) -> anyhow::Result<GasFees> {
            anyhow::bail!("fetch failed")
        }
    }

    fn constant(max_fee: u128, priority_fee: u128) -> Box<dyn FeeSource> {
        Box::new(ConstantFeeSource(GasFees {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        }))
    }

    fn manager(profile: FeeProfile, sources: Vec<Box<dyn FeeSource>>) -> GasPriceManager {
        GasPriceManager::with_sources(profile, sources, DEFAULT_GAS_PRICE_TIME_VALIDITY_SECONDS)
    }

    #[test]
    fn test_queue_coalesces_within_a_second() {
        let mut queue = MinFeeQueue::new(10);
        queue.observe(10 * GWEI, 0);
        queue.observe(8 * GWEI, 500);
        assert_eq!(
            queue.entries.back(),
            Some(&FeeObservation {
                at_millis: 500,
                fee: 8 * GWEI
            })
        );

        queue.observe(12 * GWEI, 1500);
        assert_eq!(queue.entries.len(), 2);
        assert_eq!(queue.min(), Some(8 * GWEI));

        // a higher fee within the same second is a no-op
        queue.observe(20 * GWEI, 1600);
        assert_eq!(queue.entries.len(), 2);
        assert_eq!(queue.min(), Some(8 * GWEI));
    }

    #[test]
    fn test_queue_evicts_oldest_at_capacity() {
        let mut queue = MinFeeQueue::new(3);
        for second in 0..5_u64 {
            queue.observe((10 + second as u128) * GWEI, second * 1000);
        }
        assert_eq!(queue.entries.len(), 3);
        // seconds 0 and 1 were evicted
        assert_eq!(queue.min(), Some(12 * GWEI));
    }

    #[tokio::test]
    async fn test_bump_is_applied() {
        let manager = manager(fee_profile(id::SEPOLIA), vec![constant(10 * GWEI, GWEI)]);
        let fees = manager.get_gas_price().await.unwrap();
        assert_eq!(fees.max_fee_per_gas, 12 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, GWEI * 120 / 100);
    }

    #[tokio::test]
    async fn test_min_priority_fee_applied_before_bump() {
        let profile = FeeProfile {
            min_priority_fee: 31 * GWEI,
            ..Default::default()
        };
        let manager = manager(profile, vec![constant(10 * GWEI, GWEI)]);
        let fees = manager.get_gas_price().await.unwrap();
        // the priority fee was raised to the chain minimum and the max fee
        // was raised to match it
        assert_eq!(fees.max_priority_fee_per_gas, 31 * GWEI);
        assert_eq!(fees.max_fee_per_gas, 31 * GWEI);
    }

    #[tokio::test]
    async fn test_celo_collapses_to_max() {
        let manager = manager(fee_profile(id::CELO), vec![constant(10 * GWEI, 2 * GWEI)]);
        let fees = manager.get_gas_price().await.unwrap();
        assert_eq!(fees.max_fee_per_gas, 15 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 15 * GWEI);
    }

    #[tokio::test]
    async fn test_floors_applied() {
        let manager = manager(fee_profile(id::DFK), vec![constant(GWEI, GWEI / 2)]);
        let fees = manager.get_gas_price().await.unwrap();
        assert_eq!(fees.max_fee_per_gas, 5 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 5 * GWEI);
    }

    #[tokio::test]
    async fn test_falls_through_failed_sources() {
        let manager = manager(
            FeeProfile::default(),
            vec![Box::new(FailingFeeSource), constant(7 * GWEI, GWEI)],
        );
        let fees = manager.get_gas_price().await.unwrap();
        assert_eq!(fees.max_fee_per_gas, 7 * GWEI);
    }

    #[tokio::test]
    async fn test_all_sources_failed() {
        let manager = manager(FeeProfile::default(), vec![Box::new(FailingFeeSource)]);
        manager.get_gas_price().await.unwrap_err();
    }

    #[tokio::test]
    async fn test_validate_against_rolling_minimum() {
        let manager = manager(FeeProfile::default(), vec![]);
        manager.record(
            GasFees {
                max_fee_per_gas: 10 * GWEI,
                max_priority_fee_per_gas: 10 * GWEI,
            },
            0,
        );
        manager.record(
            GasFees {
                max_fee_per_gas: 8 * GWEI,
                max_priority_fee_per_gas: 8 * GWEI,
            },
            500,
        );
        manager.record(
            GasFees {
                max_fee_per_gas: 12 * GWEI,
                max_priority_fee_per_gas: 12 * GWEI,
            },
            1500,
        );

        let rejected = manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 7 * GWEI,
                max_priority_fee_per_gas: 8 * GWEI,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            rejected,
            GasPriceError::MaxFeePerGasTooLow {
                submitted,
                minimum,
            } if submitted == 7 * GWEI && minimum == 8 * GWEI
        ));

        manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 8 * GWEI,
                max_priority_fee_per_gas: 8 * GWEI,
            })
            .await
            .unwrap();

        // componentwise-larger fees stay accepted
        manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 100 * GWEI,
                max_priority_fee_per_gas: 100 * GWEI,
            })
            .await
            .unwrap();

        let rejected = manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 8 * GWEI,
                max_priority_fee_per_gas: 7 * GWEI,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            rejected,
            GasPriceError::MaxPriorityFeePerGasTooLow { .. }
        ));
    }

    #[test]
    fn test_error_classification() {
        assert!(GasPriceError::NoObservations.is_infrastructure());
        assert!(GasPriceError::Other(anyhow::anyhow!("estimation failed")).is_infrastructure());
        assert!(!GasPriceError::MaxFeePerGasTooLow {
            submitted: 1,
            minimum: 2,
        }
        .is_infrastructure());
        assert!(!GasPriceError::MaxPriorityFeePerGasTooLow {
            submitted: 1,
            minimum: 2,
        }
        .is_infrastructure());
    }

    #[tokio::test]
    async fn test_validate_primes_cold_queues() {
        let manager = manager(FeeProfile::default(), vec![constant(10 * GWEI, GWEI)]);
        assert_eq!(manager.tracked_minimums(), (None, None));

        manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 10 * GWEI,
                max_priority_fee_per_gas: GWEI,
            })
            .await
            .unwrap();
        assert_eq!(
            manager.tracked_minimums(),
            (Some(10 * GWEI), Some(GWEI))
        );

        manager
            .validate_gas_price(GasFees {
                max_fee_per_gas: 9 * GWEI,
                max_priority_fee_per_gas: GWEI,
            })
            .await
            .unwrap_err();
    }
}

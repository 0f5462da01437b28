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

//! Chain specification and per-chain fee handling rules

use alloy_primitives::{address, Address};

/// Known chain IDs referenced by the fee tables
pub mod id {
    /// Ethereum mainnet
    pub const ETHEREUM: u64 = 1;
    /// Ethereum Sepolia testnet
    pub const SEPOLIA: u64 = 11155111;
    /// OP Mainnet
    pub const OPTIMISM: u64 = 10;
    /// Base
    pub const BASE: u64 = 8453;
    /// Arbitrum One
    pub const ARBITRUM: u64 = 42161;
    /// Scroll
    pub const SCROLL: u64 = 534352;
    /// Avalanche C-Chain
    pub const AVALANCHE: u64 = 43114;
    /// Polygon PoS
    pub const POLYGON: u64 = 137;
    /// Polygon Mumbai testnet
    pub const POLYGON_MUMBAI: u64 = 80001;
    /// Celo
    pub const CELO: u64 = 42220;
    /// Celo Alfajores testnet
    pub const CELO_ALFAJORES: u64 = 44787;
    /// Celo Baklava testnet
    pub const CELO_BAKLAVA: u64 = 62320;
    /// DFK Chain
    pub const DFK: u64 = 53935;
}

/// Known chain IDs for the Polygon ecosystem
pub const POLYGON_CHAIN_IDS: &[u64] = &[id::POLYGON, id::POLYGON_MUMBAI];

/// Known chain IDs for the Celo ecosystem
pub const CELO_CHAIN_IDS: &[u64] = &[id::CELO, id::CELO_ALFAJORES, id::CELO_BAKLAVA];

const GWEI: u128 = 1_000_000_000;

const POLYGON_GAS_STATION_URL: &str = "https://gasstation.polygon.technology/v2";
const MUMBAI_GAS_STATION_URL: &str = "https://gasstation-testnet.polygon.technology/v2";

/// Fee handling rules for a chain.
///
/// All of the chain-dependent knobs of fee estimation live here so that the
/// estimation pipeline itself is free of chain conditionals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeProfile {
    /// Percentage both fees are scaled by after estimation. 100 means unchanged.
    pub bump_percent: u32,
    /// Lower bound applied to `max_fee_per_gas` after bumping, in wei
    pub max_fee_floor: u128,
    /// Lower bound applied to `max_priority_fee_per_gas` after bumping, in wei
    pub priority_fee_floor: u128,
    /// Minimum `max_priority_fee_per_gas` enforced before bumping, in wei
    pub min_priority_fee: u128,
    /// Whether both fees are collapsed to their max after bumping
    pub collapse_to_max: bool,
    /// Gas station endpoint consulted before the RPC estimators, if any
    pub gas_station_url: Option<&'static str>,
}

impl Default for FeeProfile {
    fn default() -> Self {
        Self {
            bump_percent: 100,
            max_fee_floor: 0,
            priority_fee_floor: 0,
            min_priority_fee: 0,
            collapse_to_max: false,
            gas_station_url: None,
        }
    }
}

/// Returns the fee handling rules for the given chain id
pub fn fee_profile(chain_id: u64) -> FeeProfile {
    match chain_id {
        id::SEPOLIA => FeeProfile {
            bump_percent: 120,
            ..Default::default()
        },
        id::ETHEREUM | id::OPTIMISM | id::BASE | id::ARBITRUM | id::SCROLL | id::AVALANCHE => {
            FeeProfile {
                bump_percent: 111,
                ..Default::default()
            }
        }
        id::POLYGON => FeeProfile {
            bump_percent: 100,
            min_priority_fee: 31 * GWEI,
            gas_station_url: Some(POLYGON_GAS_STATION_URL),
            ..Default::default()
        },
        id::POLYGON_MUMBAI => FeeProfile {
            bump_percent: 100,
            min_priority_fee: GWEI,
            gas_station_url: Some(MUMBAI_GAS_STATION_URL),
            ..Default::default()
        },
        _ if CELO_CHAIN_IDS.contains(&chain_id) => FeeProfile {
            bump_percent: 150,
            collapse_to_max: true,
            ..Default::default()
        },
        id::DFK => FeeProfile {
            max_fee_floor: 5 * GWEI,
            priority_fee_floor: 5 * GWEI,
            ..Default::default()
        },
        _ => FeeProfile::default(),
    }
}

/// Chain specification
#[derive(Clone, Debug)]
pub struct ChainSpec {
    /// Chain id
    pub id: u64,
    /// Address of the entry point contract this instance validates against
    pub entry_point_address: Address,
    /// True if the chain supports EIP-1559 fee fields
    pub supports_eip1559: bool,
    /// Minimum call gas limit used when deriving gas limits from simulation output
    pub min_call_gas_limit: u128,
    /// Fixed surcharge added to the computed pre-verification gas, e.g. to cover
    /// L2 data-availability fees on chains that charge them out of band
    pub pre_verification_gas_surcharge: u128,
}

impl ChainSpec {
    /// Gas cost of a zero calldata byte
    pub const ZERO_BYTE_GAS: u128 = 4;
    /// Gas cost of a non-zero calldata byte
    pub const NON_ZERO_BYTE_GAS: u128 = 16;
    /// Per-word cost charged by the entry point for a user operation
    pub const PER_USER_OP_WORD_GAS: u128 = 4;
    /// Fixed per-operation cost charged by the entry point
    pub const PER_USER_OP_GAS: u128 = 18300;
    /// Fixed gas overhead of any EVM transaction
    pub const TRANSACTION_GAS_OVERHEAD: u128 = 21000;

    /// Returns the fee handling rules for this chain
    pub fn fee_profile(&self) -> FeeProfile {
        fee_profile(self.id)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self {
            id: 0,
            entry_point_address: address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"),
            supports_eip1559: true,
            min_call_gas_limit: 9100,
            pre_verification_gas_surcharge: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = fee_profile(999_999);
        assert_eq!(profile, FeeProfile::default());
        assert_eq!(profile.bump_percent, 100);
    }

    #[test]
    fn test_sepolia_bump() {
        assert_eq!(fee_profile(id::SEPOLIA).bump_percent, 120);
    }

    #[test]
    fn test_celo_collapses_to_max() {
        for chain_id in CELO_CHAIN_IDS {
            let profile = fee_profile(*chain_id);
            assert_eq!(profile.bump_percent, 150);
            assert!(profile.collapse_to_max);
        }
    }

    #[test]
    fn test_polygon_minimums() {
        let polygon = fee_profile(id::POLYGON);
        assert_eq!(polygon.min_priority_fee, 31 * GWEI);
        assert!(polygon.gas_station_url.is_some());

        let mumbai = fee_profile(id::POLYGON_MUMBAI);
        assert_eq!(mumbai.min_priority_fee, GWEI);
        assert!(mumbai.gas_station_url.is_some());
    }

    #[test]
    fn test_dfk_floors() {
        let profile = fee_profile(id::DFK);
        assert_eq!(profile.max_fee_floor, 5 * GWEI);
        assert_eq!(profile.priority_fee_floor, 5 * GWEI);
    }
}

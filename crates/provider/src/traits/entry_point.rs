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

//! Traits for driving the entry point simulation entrypoints.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rpc_types_eth::state::StateOverride;
use opline_types::{
    Timestamp, UserOperation, ValidationOutput, ValidationRevert,
};

use super::error::ProviderResult;

/// Result of an entry point `simulateHandleOp` call
#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    /// The amount of gas used before the operation was executed
    pub pre_op_gas: u128,
    /// The amount, in wei, paid for the operation
    pub paid: U256,
    /// The time after which the operation is valid
    pub valid_after: Timestamp,
    /// The time until which the operation is valid
    pub valid_until: Timestamp,
    /// Whether the target call succeeded
    pub target_success: bool,
    /// The return data of the target call
    pub target_result: Bytes,
}

/// Settings shared by the entry point simulation drivers
#[derive(Clone, Copy, Debug)]
pub struct SimulationConfig {
    /// Gas cap on `simulateValidation` calls, on top of the operation's
    /// declared pre-verification gas
    pub max_verification_gas: u64,
    /// Gas cap on `simulateHandleOp` calls
    pub max_simulate_handle_op_gas: u64,
    /// Neutral `from` address used for simulation calls
    pub utility_wallet_address: Address,
    /// When set, simulation calls carry a synthetic ETH balance override for
    /// the sender so that prefund transfers cannot fail on balance alone
    pub balance_override_enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_verification_gas: 5_000_000,
            max_simulate_handle_op_gas: 20_000_000,
            utility_wallet_address: Address::ZERO,
            balance_override_enabled: false,
        }
    }
}

/// Trait for the version-aware entry point simulation drivers.
///
/// Both entry point versions are driven through this one interface; the
/// implementations normalize their very different wire encodings into
/// [`ValidationOutput`] and [`ExecutionResult`].
#[async_trait::async_trait]
pub trait SimulationProvider: Send + Sync {
    /// The user operation type for the entry point version of this provider
    type UO: UserOperation;

    /// Get the address of the entry point contract this provider drives
    fn address(&self) -> &Address;

    /// Call the entry point's validation simulation and normalize the result
    async fn simulate_validation(
        &self,
        user_op: Self::UO,
    ) -> ProviderResult<Result<ValidationOutput, ValidationRevert>>;

    /// Call the entry point's `simulateHandleOp` with an optional target call
    async fn simulate_handle_op(
        &self,
        op: Self::UO,
        target: Address,
        target_call_data: Bytes,
        state_override: StateOverride,
    ) -> ProviderResult<Result<ExecutionResult, ValidationRevert>>;
}

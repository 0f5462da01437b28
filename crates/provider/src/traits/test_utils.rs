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

//! Mocks of the per-version simulation providers.

use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::state::StateOverride;
use opline_types::{v0_6, v0_7, ValidationOutput, ValidationRevert};

use super::{
    entry_point::{ExecutionResult, SimulationProvider},
    error::ProviderResult,
};

mockall::mock! {
    pub SimulationProviderV0_6 {}

    #[async_trait::async_trait]
    impl SimulationProvider for SimulationProviderV0_6 {
        type UO = v0_6::UserOperation;

        fn address(&self) -> &Address;

        async fn simulate_validation(
            &self,
            user_op: v0_6::UserOperation,
        ) -> ProviderResult<Result<ValidationOutput, ValidationRevert>>;

        async fn simulate_handle_op(
            &self,
            op: v0_6::UserOperation,
            target: Address,
            target_call_data: Bytes,
            state_override: StateOverride,
        ) -> ProviderResult<Result<ExecutionResult, ValidationRevert>>;
    }
}

mockall::mock! {
    pub SimulationProviderV0_7 {}

    #[async_trait::async_trait]
    impl SimulationProvider for SimulationProviderV0_7 {
        type UO = v0_7::UserOperation;

        fn address(&self) -> &Address;

        async fn simulate_validation(
            &self,
            user_op: v0_7::UserOperation,
        ) -> ProviderResult<Result<ValidationOutput, ValidationRevert>>;

        async fn simulate_handle_op(
            &self,
            op: v0_7::UserOperation,
            target: Address,
            target_call_data: Bytes,
            state_override: StateOverride,
        ) -> ProviderResult<Result<ExecutionResult, ValidationRevert>>;
    }
}

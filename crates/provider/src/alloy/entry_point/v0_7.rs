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

use alloy_contract::Error as ContractError;
use alloy_primitives::{Address, Bytes};
use alloy_provider::Provider as AlloyProvider;
use alloy_rpc_types_eth::state::StateOverride;
use alloy_sol_types::{ContractError as SolContractError, SolInterface};
use alloy_transport::{Transport, TransportError};
use opline_contracts::v0_7::{
    IEntryPoint::IEntryPointErrors,
    IEntryPointSimulations::{
        ExecutionResult as ContractExecutionResult, IEntryPointSimulationsInstance,
    },
};
use opline_types::{
    parse_validation_data, v0_7::UserOperation, EntityAddresses, ValidationOutput,
    ValidationRevert,
};

use super::{add_balance_override, report_unexpected_revert};
use crate::{ExecutionResult, ProviderError, ProviderResult, SimulationConfig, SimulationProvider};

/// Entry point simulation driver for v0.7.
///
/// Unlike v0.6, the v0.7 entry point has no simulation entrypoints of its
/// own. Simulation goes through a pre-deployed EntryPointSimulations
/// companion contract which returns its results as structured data.
pub struct EntryPointProvider<AP, T> {
    entry_point_address: Address,
    ep_simulations: IEntryPointSimulationsInstance<T, AP>,
    config: SimulationConfig,
}

impl<AP, T> EntryPointProvider<AP, T>
where
    T: Transport + Clone,
    AP: AlloyProvider<T>,
{
    /// Create a new `EntryPointProvider` for v0.7.
    ///
    /// `simulations_address` is the deployed EntryPointSimulations contract
    /// the simulation calls are routed through.
    pub fn new(
        entry_point_address: Address,
        simulations_address: Address,
        config: SimulationConfig,
        provider: AP,
    ) -> Self {
        Self {
            entry_point_address,
            ep_simulations: IEntryPointSimulationsInstance::new(simulations_address, provider),
            config,
        }
    }

    fn simulation_overrides(&self, sender: Address) -> StateOverride {
        let mut state_override = StateOverride::default();
        if self.config.balance_override_enabled {
            add_balance_override(&mut state_override, sender);
        }
        state_override
    }
}

#[async_trait::async_trait]
impl<AP, T> SimulationProvider for EntryPointProvider<AP, T>
where
    T: Transport + Clone,
    AP: AlloyProvider<T>,
{
    type UO = UserOperation;

    fn address(&self) -> &Address {
        &self.entry_point_address
    }

    async fn simulate_validation(
        &self,
        user_op: UserOperation,
    ) -> ProviderResult<Result<ValidationOutput, ValidationRevert>> {
        let entities = EntityAddresses {
            sender: user_op.sender,
            factory: user_op.factory,
            paymaster: user_op.paymaster,
        };
        let pvg: u64 = user_op.pre_verification_gas.try_into().unwrap_or(u64::MAX);
        let state_override = self.simulation_overrides(user_op.sender);

        let call = self
            .ep_simulations
            .simulateValidation(user_op.pack())
            .from(self.config.utility_wallet_address)
            .gas(self.config.max_verification_gas.saturating_add(pvg))
            .state(state_override);

        match call.call().await {
            Ok(ret) => Ok(Ok(ValidationOutput::from_v0_7(ret._0, &entities)
                .map_err(|e| ProviderError::Decode(e.to_string()))?)),
            Err(ContractError::TransportError(TransportError::ErrorResp(resp))) => {
                match resp.as_revert_data() {
                    Some(raw) => Ok(Err(decode_validation_revert(&raw))),
                    None => Err(TransportError::ErrorResp(resp).into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn simulate_handle_op(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
        mut state_override: StateOverride,
    ) -> ProviderResult<Result<ExecutionResult, ValidationRevert>> {
        if self.config.balance_override_enabled {
            add_balance_override(&mut state_override, op.sender);
        }

        let call = self
            .ep_simulations
            .simulateHandleOp(op.pack(), target, target_call_data)
            .from(self.config.utility_wallet_address)
            .gas(self.config.max_simulate_handle_op_gas)
            .state(state_override);

        match call.call().await {
            Ok(ret) => Ok(Ok(ret
                ._0
                .try_into()
                .map_err(|e: &str| ProviderError::Decode(e.to_string()))?)),
            Err(ContractError::TransportError(TransportError::ErrorResp(resp))) => {
                match resp.as_revert_data() {
                    Some(raw) => Ok(Err(decode_validation_revert(&raw))),
                    None => Ok(Err(ValidationRevert::Unknown(Bytes::default()))),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn decode_validation_revert(payload: &Bytes) -> ValidationRevert {
    let Ok(error) = SolContractError::<IEntryPointErrors>::abi_decode(payload, false) else {
        report_unexpected_revert("v0.7", payload);
        return ValidationRevert::Unknown(payload.clone());
    };

    match error {
        SolContractError::CustomError(IEntryPointErrors::FailedOp(failed_op)) => failed_op.into(),
        SolContractError::CustomError(IEntryPointErrors::FailedOpWithRevert(failed_op)) => {
            failed_op.into()
        }
        SolContractError::CustomError(IEntryPointErrors::SignatureValidationFailed(failure)) => {
            ValidationRevert::EntryPoint(format!(
                "Aggregator signature validation failed: {}",
                failure.aggregator
            ))
        }
        SolContractError::Revert(revert) => revert.into(),
        SolContractError::Panic(panic) => panic.into(),
    }
}

impl TryFrom<ContractExecutionResult> for ExecutionResult {
    type Error = &'static str;

    fn try_from(result: ContractExecutionResult) -> Result<Self, Self::Error> {
        let account = parse_validation_data(result.accountValidationData);
        let paymaster = parse_validation_data(result.paymasterValidationData);
        let time_range = account
            .valid_time_range()
            .intersect(paymaster.valid_time_range());

        Ok(ExecutionResult {
            pre_op_gas: result
                .preOpGas
                .try_into()
                .map_err(|_| "preOpGas is larger than u128")?,
            paid: result.paid,
            valid_after: time_range.valid_after,
            valid_until: time_range.valid_until,
            target_success: result.targetSuccess,
            target_result: result.targetResult,
        })
    }
}

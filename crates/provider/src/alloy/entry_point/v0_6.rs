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
use opline_contracts::v0_6::IEntryPoint::{
    ExecutionResult as ContractExecutionResult, IEntryPointErrors, IEntryPointInstance,
};
use opline_types::{
    v0_6::UserOperation, EntityAddresses, UserOperation as UserOperationTrait, ValidationOutput,
    ValidationRevert,
};

use super::{add_balance_override, report_unexpected_revert};
use crate::{ExecutionResult, ProviderError, ProviderResult, SimulationConfig, SimulationProvider};

/// Entry point simulation driver for v0.6.
///
/// The v0.6 entry point signals simulation success by *reverting* with a
/// typed custom error carrying the result, so both simulation calls here are
/// expected to fail at the transport layer and are decoded from revert data.
pub struct EntryPointProvider<AP, T> {
    i_entry_point: IEntryPointInstance<T, AP>,
    config: SimulationConfig,
}

impl<AP, T> EntryPointProvider<AP, T>
where
    T: Transport + Clone,
    AP: AlloyProvider<T>,
{
    /// Create a new `EntryPointProvider` for v0.6
    pub fn new(entry_point_address: Address, config: SimulationConfig, provider: AP) -> Self {
        Self {
            i_entry_point: IEntryPointInstance::new(entry_point_address, provider),
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
        self.i_entry_point.address()
    }

    async fn simulate_validation(
        &self,
        user_op: UserOperation,
    ) -> ProviderResult<Result<ValidationOutput, ValidationRevert>> {
        let entities = EntityAddresses {
            sender: user_op.sender,
            factory: user_op.factory(),
            paymaster: user_op.paymaster(),
        };
        let pvg: u64 = user_op.pre_verification_gas.try_into().unwrap_or(u64::MAX);
        let state_override = self.simulation_overrides(user_op.sender);

        let call = self
            .i_entry_point
            .simulateValidation(user_op.into())
            .from(self.config.utility_wallet_address)
            .gas(self.config.max_verification_gas.saturating_add(pvg))
            .state(state_override);

        match call.call().await {
            Ok(_) => Err(anyhow::anyhow!("simulateValidation should always revert"))?,
            Err(ContractError::TransportError(TransportError::ErrorResp(resp))) => {
                match resp.as_revert_data() {
                    Some(raw) => decode_simulate_validation_revert(&raw, &entities),
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
            .i_entry_point
            .simulateHandleOp(op.into(), target, target_call_data)
            .from(self.config.utility_wallet_address)
            .gas(self.config.max_simulate_handle_op_gas)
            .state(state_override);

        match call.call().await {
            Ok(_) => Err(anyhow::anyhow!("simulateHandleOp should always revert"))?,
            Err(ContractError::TransportError(TransportError::ErrorResp(resp))) => {
                match resp.as_revert_data() {
                    Some(raw) => decode_simulate_handle_op_revert(&raw),
                    None => Ok(Err(ValidationRevert::Unknown(Bytes::default()))),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn decode_simulate_validation_revert(
    payload: &Bytes,
    entities: &EntityAddresses,
) -> ProviderResult<Result<ValidationOutput, ValidationRevert>> {
    let Ok(error) = SolContractError::<IEntryPointErrors>::abi_decode(payload, false) else {
        report_unexpected_revert("v0.6", payload);
        return Ok(Err(ValidationRevert::Unknown(payload.clone())));
    };

    match error {
        // success cases, the entry point hands its result back as a revert
        SolContractError::CustomError(IEntryPointErrors::ValidationResult(result)) => Ok(Ok(
            ValidationOutput::from_v0_6(result, entities)
                .map_err(|e| ProviderError::Decode(e.to_string()))?,
        )),
        SolContractError::CustomError(IEntryPointErrors::ValidationResultWithAggregation(
            result,
        )) => Ok(Ok(ValidationOutput::from_v0_6_with_aggregation(
            result, entities,
        )
        .map_err(|e| ProviderError::Decode(e.to_string()))?)),
        // failure cases
        SolContractError::CustomError(IEntryPointErrors::FailedOp(failed_op)) => {
            Ok(Err(failed_op.into()))
        }
        SolContractError::Revert(revert) => Ok(Err(ValidationRevert::EntryPoint(format!(
            "UserOperation reverted during simulation with reason: {}",
            revert.reason
        )))),
        SolContractError::Panic(panic) => Ok(Err(panic.into())),
        // unexpected cases
        _ => {
            report_unexpected_revert("v0.6", payload);
            Ok(Err(ValidationRevert::Unknown(payload.clone())))
        }
    }
}

fn decode_simulate_handle_op_revert(
    payload: &Bytes,
) -> ProviderResult<Result<ExecutionResult, ValidationRevert>> {
    let Ok(error) = SolContractError::<IEntryPointErrors>::abi_decode(payload, false) else {
        return Ok(Err(ValidationRevert::Unknown(payload.clone())));
    };

    let result = match error {
        // success case
        SolContractError::CustomError(IEntryPointErrors::ExecutionResult(result)) => Ok(result
            .try_into()
            .map_err(|e: &str| ProviderError::Decode(e.to_string()))?),
        // failure cases
        SolContractError::CustomError(IEntryPointErrors::FailedOp(failed_op)) => {
            Err(failed_op.into())
        }
        SolContractError::CustomError(IEntryPointErrors::SignatureValidationFailed(failure)) => {
            Err(ValidationRevert::EntryPoint(format!(
                "Aggregator signature validation failed: {}",
                failure.aggregator
            )))
        }
        SolContractError::Revert(revert) => Err(revert.into()),
        SolContractError::Panic(panic) => Err(panic.into()),
        // unexpected cases
        SolContractError::CustomError(IEntryPointErrors::ValidationResult(_))
        | SolContractError::CustomError(IEntryPointErrors::ValidationResultWithAggregation(_)) => {
            Err(ValidationRevert::EntryPoint(
                "simulateHandleOp returned a validation result, unexpected type".to_string(),
            ))
        }
    };

    Ok(result)
}

impl TryFrom<ContractExecutionResult> for ExecutionResult {
    type Error = &'static str;

    fn try_from(result: ContractExecutionResult) -> Result<Self, Self::Error> {
        Ok(ExecutionResult {
            pre_op_gas: result
                .preOpGas
                .try_into()
                .map_err(|_| "preOpGas is larger than u128")?,
            paid: result.paid,
            valid_after: result.validAfter.to::<u64>().into(),
            valid_until: result.validUntil.to::<u64>().into(),
            target_success: result.targetSuccess,
            target_result: result.targetResult,
        })
    }
}

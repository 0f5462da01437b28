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

//! User operation validation against the entry point simulation entrypoints.

use std::{collections::HashMap, time::Duration};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types_eth::state::StateOverride;
use opline_provider::{ExecutionResult, ProviderError, SimulationProvider};
use opline_types::{
    chain::ChainSpec, v0_6, v0_7, EntryPointVersion, Timestamp, UserOperation,
    UserOperationVariant, ValidationOutput, ValidationReturnInfo,
};

use crate::gas;

// An operation must already be valid this long before admission.
const VALID_AFTER_MARGIN: Duration = Duration::from_secs(5);
// And must stay valid at least this long after admission.
const VALID_UNTIL_MARGIN: Duration = Duration::from_secs(30);

/// RPC API level the validator serves. The v1 API predates the
/// pre-verification gas check and skips it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ApiVersion {
    /// Legacy API level
    V1,
    /// Current API level
    #[default]
    V2,
}

/// Validation settings
#[derive(Clone, Copy, Debug, Default)]
pub struct Settings {
    /// The RPC API level served
    pub api_version: ApiVersion,
    /// Disables the time window checks entirely
    pub disable_expiration_check: bool,
}

/// Error produced when validating a user operation
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The on-chain simulation rejected the operation
    #[error("{0}")]
    SimulateValidation(String),
    /// The account or paymaster signature check failed
    #[error("{0}")]
    InvalidSignature(String),
    /// The operation's time window is too narrow or lies in the future
    #[error("{message}")]
    ExpiresShortly {
        /// Human readable description quoting the violated bound
        message: String,
        /// The end of the operation's validity window
        valid_until: Timestamp,
        /// The wall clock second the check ran at
        now: Timestamp,
    },
    /// The operation reverted while retrieving its execution result
    #[error("UserOperation reverted during execution: {0}")]
    UserOperationReverted(String),
    /// Transport-level failure talking to the node
    #[error("transport error: {0}")]
    Transport(String),
    /// A response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
    /// Any other unexpected condition
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ValidationError {
    fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::Unexpected(_)
        )
    }
}

impl From<ProviderError> for ValidationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(err) => Self::Transport(err),
            ProviderError::Decode(err) => Self::Decode(err),
            ProviderError::Revert(revert) => Self::Unexpected(format!("unhandled revert: {revert}")),
            ProviderError::Other(err) => Self::Unexpected(format!("{err:#}")),
        }
    }
}

/// Storage slots read during validation, keyed by contract address.
///
/// Always empty here: only tracing validators populate it.
pub type StorageMap = HashMap<Address, HashMap<B256, B256>>;

/// Hash over the code of the contracts an operation touched during
/// validation. Produced and checked by tracing validators only.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CodeHashes {
    /// The addresses whose code was hashed
    pub addresses: Vec<Address>,
    /// The combined code hash
    pub hash: B256,
}

/// A user operation that passed validation
#[derive(Clone, Debug)]
pub struct Admission {
    /// The normalized simulation output
    pub output: ValidationOutput,
    /// Storage touched during validation, empty without a tracing validator
    pub storage_map: StorageMap,
    /// Code hashes of referenced contracts, populated only by tracing
    /// validators
    pub referenced_contracts: Option<CodeHashes>,
}

/// Trait for validating user operations ahead of mempool admission
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    /// Validate a user operation, returning its admission record
    async fn validate(
        &self,
        op: UserOperationVariant,
        referenced_code_hashes: Option<CodeHashes>,
    ) -> Result<Admission, ValidationError>;
}

/// Validator implementation driving the entry point simulation entrypoints.
///
/// Only protocol-level checks are performed here: simulation outcome,
/// signatures, time window, pre-verification gas, and prefund. The ERC-7562
/// opcode and storage rules belong to tracing validators layered on top.
pub struct ValidatorImpl<E6, E7> {
    entry_point_v0_6: E6,
    entry_point_v0_7: E7,
    chain_spec: ChainSpec,
    settings: Settings,
}

impl<E6, E7> ValidatorImpl<E6, E7>
where
    E6: SimulationProvider<UO = v0_6::UserOperation>,
    E7: SimulationProvider<UO = v0_7::UserOperation>,
{
    /// Create a new validator over the two entry point drivers
    pub fn new(
        entry_point_v0_6: E6,
        entry_point_v0_7: E7,
        chain_spec: ChainSpec,
        settings: Settings,
    ) -> Self {
        Self {
            entry_point_v0_6,
            entry_point_v0_7,
            chain_spec,
            settings,
        }
    }

    /// Runs `simulateHandleOp` for the operation and surfaces its execution
    /// result, e.g. for gas estimation
    pub async fn simulate_execution(
        &self,
        op: UserOperationVariant,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<ExecutionResult, ValidationError> {
        let result = match op {
            UserOperationVariant::V0_6(op) => {
                self.entry_point_v0_6
                    .simulate_handle_op(op, target, target_call_data, StateOverride::default())
                    .await?
            }
            UserOperationVariant::V0_7(op) => {
                self.entry_point_v0_7
                    .simulate_handle_op(op, target, target_call_data, StateOverride::default())
                    .await?
            }
        };
        result.map_err(|revert| ValidationError::UserOperationReverted(revert.to_string()))
    }

    async fn do_validate(&self, op: &UserOperationVariant) -> Result<Admission, ValidationError> {
        let simulated = match op {
            UserOperationVariant::V0_6(op) => {
                self.entry_point_v0_6.simulate_validation(op.clone()).await?
            }
            UserOperationVariant::V0_7(op) => {
                self.entry_point_v0_7.simulate_validation(op.clone()).await?
            }
        };
        let output = simulated
            .map_err(|revert| ValidationError::SimulateValidation(revert.to_string()))?;

        self.check_signature(op, &output.return_info)?;
        if !self.settings.disable_expiration_check {
            self.check_time_window(&output.return_info)?;
        }
        if self.settings.api_version != ApiVersion::V1 {
            self.check_pre_verification_gas(op)?;
        }
        self.check_prefund(op, &output.return_info)?;

        Ok(Admission {
            output,
            storage_map: StorageMap::new(),
            referenced_contracts: None,
        })
    }

    fn check_signature(
        &self,
        op: &UserOperationVariant,
        return_info: &ValidationReturnInfo,
    ) -> Result<(), ValidationError> {
        match op.entry_point_version() {
            // v0.6 reports one combined signature bit
            EntryPointVersion::V0_6 => {
                if return_info.account_sig_failed || return_info.paymaster_sig_failed {
                    return Err(ValidationError::InvalidSignature(
                        "Invalid UserOp signature or paymaster signature".to_string(),
                    ));
                }
            }
            EntryPointVersion::V0_7 => {
                if return_info.account_sig_failed {
                    return Err(ValidationError::InvalidSignature(
                        "Invalid UserOp signature".to_string(),
                    ));
                }
                if return_info.paymaster_sig_failed {
                    return Err(ValidationError::InvalidSignature(
                        "Invalid paymaster signature".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_time_window(&self, return_info: &ValidationReturnInfo) -> Result<(), ValidationError> {
        let now = Timestamp::now();

        if return_info.valid_after > now - VALID_AFTER_MARGIN {
            return Err(ValidationError::ExpiresShortly {
                message: format!(
                    "User operation is not valid yet, validAfter: {}, now: {}",
                    return_info.valid_after.seconds_since_epoch(),
                    now.seconds_since_epoch(),
                ),
                valid_until: return_info.valid_until,
                now,
            });
        }
        if return_info.valid_until < now + VALID_UNTIL_MARGIN {
            return Err(ValidationError::ExpiresShortly {
                message: format!(
                    "User operation expires too soon, validUntil: {}, now: {}",
                    return_info.valid_until.seconds_since_epoch(),
                    now.seconds_since_epoch(),
                ),
                valid_until: return_info.valid_until,
                now,
            });
        }
        Ok(())
    }

    fn check_pre_verification_gas(&self, op: &UserOperationVariant) -> Result<(), ValidationError> {
        let required = gas::calc_pre_verification_gas(op, &self.chain_spec);
        if required > op.pre_verification_gas() {
            return Err(ValidationError::SimulateValidation(format!(
                "preVerificationGas is not enough, required: {required}, got: {}",
                op.pre_verification_gas(),
            )));
        }
        Ok(())
    }

    fn check_prefund(
        &self,
        op: &UserOperationVariant,
        return_info: &ValidationReturnInfo,
    ) -> Result<(), ValidationError> {
        let (verification_gas_limit, call_gas_limit) =
            gas::derive_gas_limits(return_info, op, &self.chain_spec);
        // a paymaster can be charged for up to two extra postOp runs
        let multiplier: u128 = if op.paymaster().is_some() { 3 } else { 1 };

        let required_prefund = U256::from(call_gas_limit)
            + U256::from(verification_gas_limit) * U256::from(multiplier)
            + U256::from(op.pre_verification_gas());
        if required_prefund > return_info.prefund {
            return Err(ValidationError::SimulateValidation(format!(
                "prefund is not enough, required: {required_prefund}, got: {}",
                return_info.prefund,
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<E6, E7> Validator for ValidatorImpl<E6, E7>
where
    E6: SimulationProvider<UO = v0_6::UserOperation>,
    E7: SimulationProvider<UO = v0_7::UserOperation>,
{
    async fn validate(
        &self,
        op: UserOperationVariant,
        _referenced_code_hashes: Option<CodeHashes>,
    ) -> Result<Admission, ValidationError> {
        let result = self.do_validate(&op).await;
        match &result {
            Ok(_) => metrics::counter!("validation_success").increment(1),
            Err(error) => {
                if error.is_infrastructure() {
                    tracing::error!("validation hit an infrastructure error: {error}");
                }
                metrics::counter!("validation_failure").increment(1);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use opline_provider::{MockSimulationProviderV0_6, MockSimulationProviderV0_7};
    use opline_types::{ValidationRevert, U48_MAX};

    use super::*;

    const GWEI: u128 = 1_000_000_000;

    fn good_op() -> UserOperationVariant {
        v0_6::UserOperation {
            pre_verification_gas: 50_000,
            max_fee_per_gas: GWEI,
            ..Default::default()
        }
        .into()
    }

    fn op_with_paymaster() -> UserOperationVariant {
        v0_6::UserOperation {
            pre_verification_gas: 50_000,
            max_fee_per_gas: GWEI,
            paymaster_and_data: vec![0x11_u8; 20].into(),
            ..Default::default()
        }
        .into()
    }

    fn good_output() -> ValidationOutput {
        ValidationOutput {
            return_info: ValidationReturnInfo {
                pre_op_gas: 50_000,
                prefund: U256::from(1_000_000_000_000_000_000_u128),
                valid_after: Timestamp::MIN,
                valid_until: Timestamp::new(U48_MAX),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn validator_returning(
        output: ValidationOutput,
    ) -> ValidatorImpl<MockSimulationProviderV0_6, MockSimulationProviderV0_7> {
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point
            .expect_simulate_validation()
            .returning(move |_| Ok(Ok(output.clone())));
        ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_admission_happy_path() {
        let validator = validator_returning(good_output());
        let admission = validator.validate(good_op(), None).await.unwrap();

        assert!(admission.storage_map.is_empty());
        assert!(admission.referenced_contracts.is_none());
        assert_eq!(admission.output.return_info.pre_op_gas, 50_000);
    }

    #[tokio::test]
    async fn test_invalid_signature() {
        let mut output = good_output();
        output.return_info.account_sig_failed = true;
        output.return_info.paymaster_sig_failed = true;

        let error = validator_returning(output)
            .validate(good_op(), None)
            .await
            .unwrap_err();
        match error {
            ValidationError::InvalidSignature(message) => {
                assert!(message.contains("Invalid UserOp signature"));
            }
            other => panic!("expected InvalidSignature, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_v0_7_distinguishes_signature_failures() {
        for (account_failed, expected) in [
            (true, "Invalid UserOp signature"),
            (false, "Invalid paymaster signature"),
        ] {
            let mut output = good_output();
            output.return_info.account_sig_failed = account_failed;
            output.return_info.paymaster_sig_failed = !account_failed;

            let mut entry_point = MockSimulationProviderV0_7::new();
            entry_point
                .expect_simulate_validation()
                .returning(move |_| Ok(Ok(output.clone())));
            let validator = ValidatorImpl::new(
                MockSimulationProviderV0_6::new(),
                entry_point,
                ChainSpec::default(),
                Settings::default(),
            );

            let op: UserOperationVariant = v0_7::UserOperation {
                pre_verification_gas: 60_000,
                max_fee_per_gas: GWEI,
                ..Default::default()
            }
            .into();
            let error = validator.validate(op, None).await.unwrap_err();
            match error {
                ValidationError::InvalidSignature(message) => assert_eq!(message, expected),
                other => panic!("expected InvalidSignature, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_expires_too_soon() {
        let soon = Timestamp::now() + Duration::from_secs(10);
        let mut output = good_output();
        output.return_info.valid_until = soon;

        let error = validator_returning(output)
            .validate(good_op(), None)
            .await
            .unwrap_err();
        match error {
            ValidationError::ExpiresShortly {
                message,
                valid_until,
                ..
            } => {
                assert_eq!(valid_until, soon);
                assert!(message.contains("expires too soon"));
                assert!(message.contains(&format!("validUntil: {}", soon.seconds_since_epoch())));
                assert!(message.contains("now: "));
            }
            other => panic!("expected ExpiresShortly, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_valid_yet() {
        let mut output = good_output();
        output.return_info.valid_after = Timestamp::now() + Duration::from_secs(3600);

        let error = validator_returning(output)
            .validate(good_op(), None)
            .await
            .unwrap_err();
        match error {
            ValidationError::ExpiresShortly { message, .. } => {
                assert!(message.contains("not valid yet"));
            }
            other => panic!("expected ExpiresShortly, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expiration_check_can_be_disabled() {
        let mut output = good_output();
        output.return_info.valid_until = Timestamp::now() + Duration::from_secs(10);

        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point
            .expect_simulate_validation()
            .returning(move |_| Ok(Ok(output.clone())));
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings {
                disable_expiration_check: true,
                ..Default::default()
            },
        );

        validator.validate(good_op(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_pre_verification_gas_too_low() {
        let op: UserOperationVariant = v0_6::UserOperation {
            pre_verification_gas: 1_000,
            max_fee_per_gas: GWEI,
            ..Default::default()
        }
        .into();

        let error = validator_returning(good_output())
            .validate(op, None)
            .await
            .unwrap_err();
        match error {
            ValidationError::SimulateValidation(message) => {
                assert!(message.contains("preVerificationGas is not enough"));
                assert!(message.contains("got: 1000"));
            }
            other => panic!("expected SimulateValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pre_verification_gas_skipped_on_v1() {
        let op: UserOperationVariant = v0_6::UserOperation {
            pre_verification_gas: 1_000,
            max_fee_per_gas: GWEI,
            ..Default::default()
        }
        .into();

        let mut output = good_output();
        output.return_info.pre_op_gas = 1_000;
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point
            .expect_simulate_validation()
            .returning(move |_| Ok(Ok(output.clone())));
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings {
                api_version: ApiVersion::V1,
                ..Default::default()
            },
        );

        validator.validate(op, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_prefund_with_paymaster() {
        // prefund covers the operation without the paymaster multiplier:
        // derived limits are verification 150k, call 9.1k (minimum), so
        // 9_100 + 150_000 + 50_000 wei would be exactly enough at m=1
        let mut output = good_output();
        output.return_info.pre_op_gas = 150_000;
        output.return_info.prefund = U256::from(209_100);

        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point
            .expect_simulate_validation()
            .returning(move |_| Ok(Ok(output.clone())));
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings {
                api_version: ApiVersion::V1,
                ..Default::default()
            },
        );

        let error = validator
            .validate(op_with_paymaster(), None)
            .await
            .unwrap_err();
        match error {
            ValidationError::SimulateValidation(message) => {
                assert_eq!(
                    message,
                    "prefund is not enough, required: 509100, got: 209100"
                );
            }
            other => panic!("expected SimulateValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_simulation_revert_surfaces_reason() {
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point.expect_simulate_validation().returning(|_| {
            Ok(Err(ValidationRevert::EntryPoint(
                "AA25 invalid account nonce".to_string(),
            )))
        });
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings::default(),
        );

        let error = validator.validate(good_op(), None).await.unwrap_err();
        match error {
            ValidationError::SimulateValidation(message) => {
                assert_eq!(message, "AA25 invalid account nonce");
            }
            other => panic!("expected SimulateValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point
            .expect_simulate_validation()
            .returning(|_| Err(ProviderError::Transport("connection refused".to_string())));
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings::default(),
        );

        let error = validator.validate(good_op(), None).await.unwrap_err();
        assert!(matches!(error, ValidationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_simulate_execution_maps_revert() {
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point.expect_simulate_handle_op().returning(|_, _, _, _| {
            Ok(Err(ValidationRevert::EntryPoint(
                "AA21 didn't pay prefund".to_string(),
            )))
        });
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings::default(),
        );

        let error = validator
            .simulate_execution(good_op(), Address::ZERO, Bytes::new())
            .await
            .unwrap_err();
        match error {
            ValidationError::UserOperationReverted(message) => {
                assert!(message.contains("AA21"));
            }
            other => panic!("expected UserOperationReverted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_simulate_execution_success() {
        let mut entry_point = MockSimulationProviderV0_6::new();
        entry_point.expect_simulate_handle_op().returning(|_, _, _, _| {
            Ok(Ok(ExecutionResult {
                pre_op_gas: 60_000,
                paid: U256::from(42),
                ..Default::default()
            }))
        });
        let validator = ValidatorImpl::new(
            entry_point,
            MockSimulationProviderV0_7::new(),
            ChainSpec::default(),
            Settings::default(),
        );

        let result = validator
            .simulate_execution(good_op(), Address::ZERO, Bytes::new())
            .await
            .unwrap();
        assert_eq!(result.pre_op_gas, 60_000);
    }
}

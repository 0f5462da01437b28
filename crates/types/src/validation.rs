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

//! Validation results of the entry point contracts, and the packed
//! `validationData` word codec shared by both entry point versions.

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{Panic, Revert, SolError};
use opline_contracts::{
    v0_6::{
        AggregatorStakeInfo as AggregatorStakeInfoV0_6,
        IEntryPoint::{
            FailedOp as FailedOpV0_6, ValidationResult as ValidationResultV0_6,
            ValidationResultWithAggregation as ValidationResultWithAggregationV0_6,
        },
        ReturnInfo as ReturnInfoV0_6, StakeInfo as StakeInfoV0_6,
    },
    v0_7::{
        AggregatorStakeInfo as AggregatorStakeInfoV0_7,
        IEntryPoint::{FailedOp as FailedOpV0_7, FailedOpWithRevert as FailedOpWithRevertV0_7},
        ReturnInfo as ReturnInfoV0_7, StakeInfo as StakeInfoV0_7,
        ValidationResult as ValidationResultV0_7,
    },
};

use crate::{Timestamp, ValidTimeRange};

/// Both v0.6 and v0.7 contracts use this aggregator address to indicate that
/// the signature validation failed.
const SIG_VALIDATION_FAILED: Address = address!("0000000000000000000000000000000000000001");

/// The largest value representable in the 48-bit timestamp fields of a packed
/// `validationData` word. A zero `valid_until` unpacks to this value, meaning
/// the operation never expires.
pub const U48_MAX: u64 = (1 << 48) - 1;

/// Error during validation simulation
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum ValidationRevert {
    /// The entry point reverted
    #[error("{0}")]
    EntryPoint(String),
    /// The operation reverted
    #[error("{}", Self::display_operation_error(.entry_point_reason, .inner_revert_reason))]
    Operation {
        /// Error message returned by entry point
        entry_point_reason: String,
        /// Revert data of the validation failure returned by an entity
        inner_revert_data: Bytes,
        /// Message parsed from the inner revert data, if the entity used the
        /// `revert` or `require` Solidity keywords
        inner_revert_reason: Option<String>,
    },
    /// Validation reverted with an unknown signature
    #[error("revert with bytes: {0:?}")]
    Unknown(Bytes),
    /// Validation reverted with a panic
    #[error("panic: {0}")]
    Panic(Panic),
}

impl ValidationRevert {
    /// Extracts the error code string returned by the entry point, e.g.
    /// `"AA24"`, if it exists.
    pub fn entry_point_error_code(&self) -> Option<&str> {
        let message = match self {
            Self::EntryPoint(message) => Some(message),
            Self::Operation {
                entry_point_reason: entry_point_message,
                ..
            } => Some(entry_point_message),
            Self::Unknown(_) | Self::Panic(_) => None,
        };
        message
            .filter(|m| m.len() >= 4 && m.starts_with("AA"))
            .map(|m| &m[..4])
    }

    fn display_operation_error(
        entry_point_message: &str,
        inner_message: &Option<String>,
    ) -> String {
        match inner_message {
            Some(inner_message) => format!("{entry_point_message} : {inner_message}"),
            None => entry_point_message.to_owned(),
        }
    }
}

impl From<Revert> for ValidationRevert {
    fn from(value: Revert) -> Self {
        ValidationRevert::EntryPoint(value.reason)
    }
}

impl From<Panic> for ValidationRevert {
    fn from(value: Panic) -> Self {
        ValidationRevert::Panic(value)
    }
}

impl From<FailedOpV0_6> for ValidationRevert {
    fn from(value: FailedOpV0_6) -> Self {
        ValidationRevert::EntryPoint(value.reason)
    }
}

impl From<FailedOpV0_7> for ValidationRevert {
    fn from(value: FailedOpV0_7) -> Self {
        ValidationRevert::EntryPoint(value.reason)
    }
}

impl From<FailedOpWithRevertV0_7> for ValidationRevert {
    fn from(value: FailedOpWithRevertV0_7) -> Self {
        let inner_message = Revert::abi_decode(&value.inner, false)
            .ok()
            .map(|err| err.reason);
        ValidationRevert::Operation {
            entry_point_reason: value.reason,
            inner_revert_data: value.inner,
            inner_revert_reason: inner_message,
        }
    }
}

/// The unpacked form of the 256-bit `validationData` word returned by account
/// and paymaster signature checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidationData {
    /// The aggregator address. Zero means the signature verified without an
    /// aggregator, `0x..01` means it failed, anything else names an external
    /// signature aggregator contract.
    pub aggregator: Address,
    /// The earliest time the operation is valid, in seconds
    pub valid_after: u64,
    /// The latest time the operation is valid, in seconds
    pub valid_until: u64,
}

impl ValidationData {
    /// Valid time range for the validation data
    pub fn valid_time_range(&self) -> ValidTimeRange {
        ValidTimeRange::new(self.valid_after.into(), self.valid_until.into())
    }

    /// Whether this side of the validation refused the signature. Any
    /// non-zero aggregator counts as a failure: the marker address is an
    /// explicit failure and external aggregators are not supported here.
    pub fn signature_failed(&self) -> bool {
        !self.aggregator.is_zero()
    }

    /// The external aggregator address, if one was named
    pub fn aggregator(&self) -> Option<Address> {
        if self.aggregator == SIG_VALIDATION_FAILED || self.aggregator.is_zero() {
            None
        } else {
            Some(self.aggregator)
        }
    }
}

/// Error from the validation data codec
#[derive(Clone, Copy, Debug, thiserror::Error, Eq, PartialEq)]
pub enum ValidationDataError {
    /// A timestamp does not fit into the 48-bit packed field
    #[error("timestamp {0} does not fit in 48 bits")]
    TimestampOverflow(u64),
}

/// Parse a packed `validationData` word.
///
/// Works for both v0.6 and v0.7 validation data.
///
/// Layout, big-endian: bytes `[0..6)` are `valid_after`, bytes `[6..12)` are
/// `valid_until`, bytes `[12..32)` are the aggregator address. A zero
/// `valid_until` is converted to [`U48_MAX`].
pub fn parse_validation_data(data: U256) -> ValidationData {
    let slice: [u8; 32] = data.to_be_bytes();
    let aggregator = Address::from_slice(&slice[12..]);

    let mut buf = [0; 8];
    buf[2..8].copy_from_slice(&slice[6..12]);
    let mut valid_until = u64::from_be_bytes(buf);
    if valid_until == 0 {
        valid_until = U48_MAX;
    }

    let mut buf = [0; 8];
    buf[2..8].copy_from_slice(&slice[..6]);
    let valid_after = u64::from_be_bytes(buf);

    ValidationData {
        aggregator,
        valid_after,
        valid_until,
    }
}

/// Pack validation data into its 256-bit on-chain representation.
///
/// Rejects timestamps that do not fit into the packed 48-bit fields.
pub fn pack_validation_data(data: &ValidationData) -> Result<U256, ValidationDataError> {
    if data.valid_after > U48_MAX {
        return Err(ValidationDataError::TimestampOverflow(data.valid_after));
    }
    if data.valid_until > U48_MAX {
        return Err(ValidationDataError::TimestampOverflow(data.valid_until));
    }

    let mut out = [0_u8; 32];
    out[..6].copy_from_slice(&data.valid_after.to_be_bytes()[2..]);
    out[6..12].copy_from_slice(&data.valid_until.to_be_bytes()[2..]);
    out[12..].copy_from_slice(data.aggregator.as_slice());
    Ok(U256::from_be_bytes(out))
}

/// The merge of the account- and paymaster-side validation data of one
/// operation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MergedValidationData {
    /// Whether the account signature verification failed
    pub account_sig_failed: bool,
    /// Whether the paymaster signature verification failed
    pub paymaster_sig_failed: bool,
    /// The time range during which both sides consider the operation valid
    pub time_range: ValidTimeRange,
}

/// Merge the account- and paymaster-side validation data: the signature
/// flags are kept per side and the time windows are intersected.
pub fn merge_validation_data(
    account: ValidationData,
    paymaster: ValidationData,
) -> MergedValidationData {
    MergedValidationData {
        account_sig_failed: account.signature_failed(),
        paymaster_sig_failed: paymaster.signature_failed(),
        time_range: account
            .valid_time_range()
            .intersect(paymaster.valid_time_range()),
    }
}

/// ValidationReturnInfo from EntryPoint contract
#[derive(Clone, Debug, Default)]
pub struct ValidationReturnInfo {
    /// The amount of gas used before the op was executed (pre verification gas and validation gas)
    pub pre_op_gas: u128,
    /// The amount, in wei, the entry point requires held in reserve for this operation
    pub prefund: U256,
    /// Whether the account signature verification failed
    pub account_sig_failed: bool,
    /// Whether the paymaster signature verification failed
    pub paymaster_sig_failed: bool,
    /// The time after which the op is valid
    pub valid_after: Timestamp,
    /// The time until which the op is valid
    pub valid_until: Timestamp,
    /// The paymaster context
    pub paymaster_context: Bytes,
}

impl TryFrom<ReturnInfoV0_6> for ValidationReturnInfo {
    type Error = &'static str;

    fn try_from(value: ReturnInfoV0_6) -> Result<Self, Self::Error> {
        let ReturnInfoV0_6 {
            preOpGas,
            prefund,
            sigFailed,
            validAfter,
            validUntil,
            paymasterContext,
        } = value;

        let valid_until = match validUntil.to::<u64>() {
            // zero means the operation never expires
            0 => U48_MAX,
            v => v,
        };

        Ok(Self {
            pre_op_gas: preOpGas
                .try_into()
                .map_err(|_| "preOpGas is larger than u128")?,
            prefund,
            // In v0.6 if one signature fails both do
            account_sig_failed: sigFailed,
            paymaster_sig_failed: sigFailed,
            valid_after: validAfter.to::<u64>().into(),
            valid_until: valid_until.into(),
            paymaster_context: paymasterContext,
        })
    }
}

impl TryFrom<ReturnInfoV0_7> for ValidationReturnInfo {
    type Error = &'static str;

    fn try_from(value: ReturnInfoV0_7) -> Result<Self, Self::Error> {
        let ReturnInfoV0_7 {
            preOpGas,
            prefund,
            accountValidationData,
            paymasterValidationData,
            paymasterContext,
        } = value;

        let merged = merge_validation_data(
            parse_validation_data(accountValidationData),
            parse_validation_data(paymasterValidationData),
        );

        Ok(Self {
            pre_op_gas: preOpGas
                .try_into()
                .map_err(|_| "preOpGas is larger than u128")?,
            prefund,
            account_sig_failed: merged.account_sig_failed,
            paymaster_sig_failed: merged.paymaster_sig_failed,
            valid_after: merged.time_range.valid_after,
            valid_until: merged.time_range.valid_until,
            paymaster_context: paymasterContext,
        })
    }
}

/// StakeInfo from EntryPoint contract, augmented with the entity address
#[derive(Clone, Copy, Debug, Default)]
pub struct StakeInfo {
    /// The address of the entity
    pub address: Address,
    /// The amount of stake
    pub stake: U256,
    /// The delay for unstaking
    pub unstake_delay_sec: u32,
}

impl StakeInfo {
    fn new(address: Address, stake: U256, unstake_delay_sec: U256) -> Result<Self, &'static str> {
        Ok(Self {
            address,
            stake,
            unstake_delay_sec: unstake_delay_sec
                .try_into()
                .map_err(|_| "unstake delay is larger than u32")?,
        })
    }

    fn from_v0_6(address: Address, info: StakeInfoV0_6) -> Result<Self, &'static str> {
        Self::new(address, info.stake, info.unstakeDelaySec)
    }

    fn from_v0_7(address: Address, info: StakeInfoV0_7) -> Result<Self, &'static str> {
        Self::new(address, info.stake, info.unstakeDelaySec)
    }
}

/// AggregatorInfo from EntryPoint contract
#[derive(Clone, Copy, Debug)]
pub struct AggregatorInfo {
    /// The address of the aggregator
    pub address: Address,
    /// The stake info for the aggregator
    pub stake_info: StakeInfo,
}

impl TryFrom<AggregatorStakeInfoV0_6> for AggregatorInfo {
    type Error = &'static str;

    fn try_from(value: AggregatorStakeInfoV0_6) -> Result<Self, Self::Error> {
        Ok(Self {
            address: value.aggregator,
            stake_info: StakeInfo::new(
                value.aggregator,
                value.stakeInfo.stake,
                value.stakeInfo.unstakeDelaySec,
            )?,
        })
    }
}

impl TryFrom<AggregatorStakeInfoV0_7> for AggregatorInfo {
    type Error = &'static str;

    fn try_from(value: AggregatorStakeInfoV0_7) -> Result<Self, Self::Error> {
        Ok(Self {
            address: value.aggregator,
            stake_info: StakeInfo::new(
                value.aggregator,
                value.stakeInfo.stake,
                value.stakeInfo.unstakeDelaySec,
            )?,
        })
    }
}

/// Addresses of the entities of a user operation, used to attach addresses
/// to the per-entity stake infos returned by simulation
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityAddresses {
    /// The sender of the operation
    pub sender: Address,
    /// The factory, if the operation deploys the sender
    pub factory: Option<Address>,
    /// The paymaster, if the operation uses one
    pub paymaster: Option<Address>,
}

/// Equivalent to the `ValidationResult` shapes of the entry point contracts,
/// but with named structs instead of tuples, entity addresses attached, and
/// the v0.7 packed validation data already unpacked and merged.
#[derive(Clone, Debug, Default)]
pub struct ValidationOutput {
    /// The return info from the validation function
    pub return_info: ValidationReturnInfo,
    /// The stake info for the sender
    pub sender_info: StakeInfo,
    /// The stake info for the factory, if the operation has one
    pub factory_info: Option<StakeInfo>,
    /// The stake info for the paymaster, if the operation has one
    pub paymaster_info: Option<StakeInfo>,
    /// The aggregator info, if an aggregator was used
    pub aggregator_info: Option<AggregatorInfo>,
}

impl ValidationOutput {
    /// Convert a decoded v0.6 `ValidationResult` revert
    pub fn from_v0_6(
        value: ValidationResultV0_6,
        entities: &EntityAddresses,
    ) -> Result<Self, &'static str> {
        let ValidationResultV0_6 {
            returnInfo,
            senderInfo,
            factoryInfo,
            paymasterInfo,
        } = value;
        Ok(Self {
            return_info: returnInfo.try_into()?,
            sender_info: StakeInfo::from_v0_6(entities.sender, senderInfo)?,
            factory_info: entities
                .factory
                .map(|addr| StakeInfo::from_v0_6(addr, factoryInfo))
                .transpose()?,
            paymaster_info: entities
                .paymaster
                .map(|addr| StakeInfo::from_v0_6(addr, paymasterInfo))
                .transpose()?,
            aggregator_info: None,
        })
    }

    /// Convert a decoded v0.6 `ValidationResultWithAggregation` revert
    pub fn from_v0_6_with_aggregation(
        value: ValidationResultWithAggregationV0_6,
        entities: &EntityAddresses,
    ) -> Result<Self, &'static str> {
        let ValidationResultWithAggregationV0_6 {
            returnInfo,
            senderInfo,
            factoryInfo,
            paymasterInfo,
            aggregatorInfo,
        } = value;
        Ok(Self {
            return_info: returnInfo.try_into()?,
            sender_info: StakeInfo::from_v0_6(entities.sender, senderInfo)?,
            factory_info: entities
                .factory
                .map(|addr| StakeInfo::from_v0_6(addr, factoryInfo))
                .transpose()?,
            paymaster_info: entities
                .paymaster
                .map(|addr| StakeInfo::from_v0_6(addr, paymasterInfo))
                .transpose()?,
            aggregator_info: Some(aggregatorInfo.try_into()?),
        })
    }

    /// Convert the structured return of the v0.7 EntryPointSimulations
    /// `simulateValidation` call
    pub fn from_v0_7(
        value: ValidationResultV0_7,
        entities: &EntityAddresses,
    ) -> Result<Self, &'static str> {
        let ValidationResultV0_7 {
            returnInfo,
            senderInfo,
            factoryInfo,
            paymasterInfo,
            aggregatorInfo,
        } = value;

        let aggregator_info = if aggregatorInfo.aggregator.is_zero() {
            None
        } else {
            Some(aggregatorInfo.try_into()?)
        };

        Ok(Self {
            return_info: returnInfo.try_into()?,
            sender_info: StakeInfo::from_v0_7(entities.sender, senderInfo)?,
            factory_info: entities
                .factory
                .map(|addr| StakeInfo::from_v0_7(addr, factoryInfo))
                .transpose()?,
            paymaster_info: entities
                .paymaster
                .map(|addr| StakeInfo::from_v0_7(addr, paymasterInfo))
                .transpose()?,
            aggregator_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::uint;

    use super::*;

    #[test]
    fn test_parse_validation_data() {
        let data = uint!(0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff_U256);
        let parsed = parse_validation_data(data);
        assert_eq!(
            parsed.aggregator,
            address!("ccddeeff00112233445566778899aabbccddeeff")
        );
        assert_eq!(parsed.valid_until, 0x66778899aabb);
        assert_eq!(parsed.valid_after, 0x001122334455);
    }

    #[test]
    fn test_parse_validation_data_zero_valid_until() {
        let data = uint!(0x001122334455000000000000ccddeeff00112233445566778899aabbccddeeff_U256);
        let parsed = parse_validation_data(data);
        assert_eq!(
            parsed.aggregator,
            address!("ccddeeff00112233445566778899aabbccddeeff")
        );
        assert_eq!(parsed.valid_until, U48_MAX);
        assert_eq!(parsed.valid_after, 0x001122334455);
    }

    #[test]
    fn test_pack_validation_data() {
        let packed = pack_validation_data(&ValidationData {
            aggregator: Address::ZERO,
            valid_after: 100,
            valid_until: 200,
        })
        .unwrap();
        let expected = (U256::from(100) << 208) | (U256::from(200) << 160);
        assert_eq!(packed, expected);

        let parsed = parse_validation_data(packed);
        assert_eq!(parsed.aggregator, Address::ZERO);
        assert_eq!(parsed.valid_after, 100);
        assert_eq!(parsed.valid_until, 200);
    }

    #[test]
    fn test_pack_zero_round_trips_through_canonical_valid_until() {
        let parsed = parse_validation_data(pack_validation_data(&ValidationData {
            aggregator: Address::ZERO,
            valid_after: 0,
            valid_until: 0,
        })
        .unwrap());
        assert_eq!(parsed.aggregator, Address::ZERO);
        assert_eq!(parsed.valid_after, 0);
        assert_eq!(parsed.valid_until, U48_MAX);
    }

    #[test]
    fn test_parse_then_pack_is_identity() {
        let data = uint!(0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff_U256);
        let packed = pack_validation_data(&parse_validation_data(data)).unwrap();
        assert_eq!(packed, data);
    }

    #[test]
    fn test_pack_rejects_u48_overflow() {
        let data = ValidationData {
            aggregator: Address::ZERO,
            valid_after: 1 << 48,
            valid_until: 100,
        };
        assert_eq!(
            pack_validation_data(&data),
            Err(ValidationDataError::TimestampOverflow(1 << 48))
        );
    }

    #[test]
    fn test_merge_validation_data() {
        let account = ValidationData {
            aggregator: Address::ZERO,
            valid_after: 100,
            valid_until: 300,
        };
        let paymaster = ValidationData {
            aggregator: SIG_VALIDATION_FAILED,
            valid_after: 150,
            valid_until: 250,
        };
        let merged = merge_validation_data(account, paymaster);
        assert!(!merged.account_sig_failed);
        assert!(merged.paymaster_sig_failed);
        assert_eq!(merged.time_range.valid_after, Timestamp::new(150));
        assert_eq!(merged.time_range.valid_until, Timestamp::new(250));
    }

    #[test]
    fn test_external_aggregator_counts_as_failure() {
        let data = ValidationData {
            aggregator: address!("ccddeeff00112233445566778899aabbccddeeff"),
            valid_after: 0,
            valid_until: U48_MAX,
        };
        assert!(data.signature_failed());
        assert_eq!(
            data.aggregator(),
            Some(address!("ccddeeff00112233445566778899aabbccddeeff"))
        );

        let failed = ValidationData {
            aggregator: SIG_VALIDATION_FAILED,
            valid_after: 0,
            valid_until: U48_MAX,
        };
        assert!(failed.signature_failed());
        assert_eq!(failed.aggregator(), None);
    }

    #[test]
    fn test_return_info_v0_6_zero_valid_until() {
        let info = ValidationReturnInfo::try_from(ReturnInfoV0_6 {
            preOpGas: U256::from(50_000),
            prefund: U256::from(1_000_000),
            sigFailed: false,
            validAfter: uint!(0_U48),
            validUntil: uint!(0_U48),
            paymasterContext: Bytes::new(),
        })
        .unwrap();
        assert_eq!(info.valid_until, Timestamp::new(U48_MAX));
        assert_eq!(info.prefund, U256::from(1_000_000));
        assert!(!info.account_sig_failed);
        assert!(!info.paymaster_sig_failed);
    }

    #[test]
    fn test_output_entities_attached() {
        let entities = EntityAddresses {
            sender: address!("0102030405060708090a0b0c0d0e0f1011121314"),
            factory: None,
            paymaster: Some(address!("ffeeddccbbaa99887766554433221100ffeeddcc")),
        };
        let output = ValidationOutput::from_v0_6(
            ValidationResultV0_6 {
                returnInfo: ReturnInfoV0_6::default(),
                senderInfo: StakeInfoV0_6 {
                    stake: U256::from(10),
                    unstakeDelaySec: U256::from(86400),
                },
                factoryInfo: StakeInfoV0_6::default(),
                paymasterInfo: StakeInfoV0_6::default(),
            },
            &entities,
        )
        .unwrap();

        assert_eq!(output.sender_info.address, entities.sender);
        assert_eq!(output.sender_info.stake, U256::from(10));
        assert_eq!(output.sender_info.unstake_delay_sec, 86400);
        assert!(output.factory_info.is_none());
        assert_eq!(
            output.paymaster_info.unwrap().address,
            entities.paymaster.unwrap()
        );
        assert!(output.aggregator_info.is_none());
    }
}

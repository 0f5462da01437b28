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

//! Gas accounting for user operations: pre-verification gas, derived gas
//! limits, and the gas price manager.

use alloy_primitives::U256;
use opline_types::{chain::ChainSpec, UserOperation, UserOperationVariant, ValidationReturnInfo};
use opline_utils::math;

mod fees;
pub use fees::{GasPriceError, GasPriceManager, DEFAULT_GAS_PRICE_TIME_VALIDITY_SECONDS};

mod oracle;

mod polygon;

/// Returns the minimum `pre_verification_gas` for the given user operation.
///
/// This is the portion of an operation's gas that the entry point cannot
/// meter on chain: the calldata cost of carrying the operation in the bundle
/// transaction plus the entry point's fixed per-operation overhead. Chains
/// that charge data-availability fees out of band contribute a fixed
/// surcharge through their [`ChainSpec`].
pub fn calc_pre_verification_gas(op: &UserOperationVariant, chain_spec: &ChainSpec) -> u128 {
    let encoded = op.abi_encode();
    // size of an ABI encoded user op is always a multiple of 32 bytes
    let length_in_words = encoded.len() as u128 / 32;
    let call_data_cost: u128 = encoded
        .iter()
        .map(|&byte| {
            if byte == 0 {
                ChainSpec::ZERO_BYTE_GAS
            } else {
                ChainSpec::NON_ZERO_BYTE_GAS
            }
        })
        .sum();

    call_data_cost
        + ChainSpec::PER_USER_OP_GAS
        + ChainSpec::PER_USER_OP_WORD_GAS * length_in_words
        + ChainSpec::TRANSACTION_GAS_OVERHEAD
        + chain_spec.pre_verification_gas_surcharge
}

/// Derives the verification and call gas limits an admitted operation will be
/// held to, from the simulation output.
///
/// The verification gas limit is the gas validation actually consumed with
/// 50% headroom for the postOp call, rounded up so the headroom never
/// truncates away. The call gas limit is whatever gas the required prefund
/// can still buy after validation, never less than the chain's minimum call
/// gas.
pub fn derive_gas_limits(
    return_info: &ValidationReturnInfo,
    op: &UserOperationVariant,
    chain_spec: &ChainSpec,
) -> (u128, u128) {
    let verification_gas_limit = math::increase_by_percent_ceil(
        return_info
            .pre_op_gas
            .saturating_sub(op.pre_verification_gas()),
        50,
    );

    let call_gas_limit = if op.max_fee_per_gas() == 0 {
        chain_spec.min_call_gas_limit
    } else {
        (return_info.prefund / U256::from(op.max_fee_per_gas()))
            .saturating_to::<u128>()
            .saturating_sub(return_info.pre_op_gas)
            .max(chain_spec.min_call_gas_limit)
    };

    (verification_gas_limit, call_gas_limit)
}

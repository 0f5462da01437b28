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

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use opline_contracts::v0_7::PackedUserOperation;

use super::{EntryPointVersion, UserOperation as UserOperationTrait};

/// User Operation for Entry Point v0.7
///
/// Offchain shape. Gas limits and fees are packed into two `bytes32` words
/// before going on chain, see [`UserOperation::pack`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserOperation {
    /*
     * Required fields
     */
    /// Sender
    pub sender: Address,
    /// Semi-abstracted nonce
    ///
    /// The first 192 bits are the nonce key, the last 64 bits are the nonce value
    pub nonce: U256,
    /// Calldata
    pub call_data: Bytes,
    /// Call gas limit
    pub call_gas_limit: u128,
    /// Verification gas limit
    pub verification_gas_limit: u128,
    /// Pre-verification gas
    pub pre_verification_gas: u128,
    /// Max fee per gas
    pub max_fee_per_gas: u128,
    /// Max priority fee per gas
    pub max_priority_fee_per_gas: u128,
    /// Signature
    pub signature: Bytes,
    /*
     * Optional fields
     */
    /// Factory, populated if deploying a new sender contract
    pub factory: Option<Address>,
    /// Factory data
    pub factory_data: Bytes,
    /// Paymaster, populated if using a paymaster
    pub paymaster: Option<Address>,
    /// Paymaster verification gas limit
    pub paymaster_verification_gas_limit: u128,
    /// Paymaster post-op gas limit
    pub paymaster_post_op_gas_limit: u128,
    /// Paymaster data
    pub paymaster_data: Bytes,
}

impl UserOperation {
    /// Pack the operation into its on-chain representation
    pub fn pack(&self) -> PackedUserOperation {
        let init_code = match self.factory {
            Some(factory) => {
                let mut buf = Vec::with_capacity(20 + self.factory_data.len());
                buf.extend_from_slice(factory.as_slice());
                buf.extend_from_slice(&self.factory_data);
                Bytes::from(buf)
            }
            None => Bytes::new(),
        };
        let paymaster_and_data = match self.paymaster {
            Some(paymaster) => {
                let mut buf = Vec::with_capacity(52 + self.paymaster_data.len());
                buf.extend_from_slice(paymaster.as_slice());
                buf.extend_from_slice(&self.paymaster_verification_gas_limit.to_be_bytes());
                buf.extend_from_slice(&self.paymaster_post_op_gas_limit.to_be_bytes());
                buf.extend_from_slice(&self.paymaster_data);
                Bytes::from(buf)
            }
            None => Bytes::new(),
        };

        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            initCode: init_code,
            callData: self.call_data.clone(),
            accountGasLimits: pack_u128_pair(self.verification_gas_limit, self.call_gas_limit),
            preVerificationGas: U256::from(self.pre_verification_gas),
            gasFees: pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas),
            paymasterAndData: paymaster_and_data,
            signature: self.signature.clone(),
        }
    }
}

impl UserOperationTrait for UserOperation {
    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V0_7
    }

    fn sender(&self) -> Address {
        self.sender
    }

    fn nonce(&self) -> U256 {
        self.nonce
    }

    fn factory(&self) -> Option<Address> {
        self.factory
    }

    fn paymaster(&self) -> Option<Address> {
        self.paymaster
    }

    fn call_gas_limit(&self) -> u128 {
        self.call_gas_limit
    }

    fn verification_gas_limit(&self) -> u128 {
        self.verification_gas_limit
    }

    fn total_verification_gas_limit(&self) -> u128 {
        self.verification_gas_limit + self.paymaster_verification_gas_limit
    }

    fn pre_verification_gas(&self) -> u128 {
        self.pre_verification_gas
    }

    fn max_fee_per_gas(&self) -> u128 {
        self.max_fee_per_gas
    }

    fn max_priority_fee_per_gas(&self) -> u128 {
        self.max_priority_fee_per_gas
    }

    fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = self.pack();
        let hashable = (
            packed.sender,
            packed.nonce,
            keccak256(&packed.initCode),
            keccak256(&packed.callData),
            packed.accountGasLimits,
            packed.preVerificationGas,
            packed.gasFees,
            keccak256(&packed.paymasterAndData),
        )
            .abi_encode();
        keccak256((keccak256(hashable), entry_point, U256::from(chain_id)).abi_encode())
    }

    fn abi_encode(&self) -> Vec<u8> {
        SolValue::abi_encode(&self.pack())
    }
}

// Two u128 values packed big-endian into one evm word, high half first.
fn pack_u128_pair(high: u128, low: u128) -> B256 {
    let mut out = [0_u8; 32];
    out[..16].copy_from_slice(&high.to_be_bytes());
    out[16..].copy_from_slice(&low.to_be_bytes());
    B256::from(out)
}

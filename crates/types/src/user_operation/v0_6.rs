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
use opline_contracts::v0_6::UserOperation as ContractUserOperation;

use super::{EntryPointVersion, UserOperation as UserOperationTrait};

/// User Operation for Entry Point v0.6
///
/// The factory and paymaster are carried inline: the first 20 bytes of
/// `init_code` name the factory and the first 20 bytes of
/// `paymaster_and_data` name the paymaster.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserOperation {
    /// Sender
    pub sender: Address,
    /// Semi-abstracted nonce
    ///
    /// The first 192 bits are the nonce key, the last 64 bits are the nonce value
    pub nonce: U256,
    /// Init code, factory address followed by factory calldata
    pub init_code: Bytes,
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
    /// Paymaster and data, paymaster address followed by paymaster calldata
    pub paymaster_and_data: Bytes,
    /// Signature
    pub signature: Bytes,
}

impl UserOperationTrait for UserOperation {
    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V0_6
    }

    fn sender(&self) -> Address {
        self.sender
    }

    fn nonce(&self) -> U256 {
        self.nonce
    }

    fn factory(&self) -> Option<Address> {
        address_prefix(&self.init_code)
    }

    fn paymaster(&self) -> Option<Address> {
        address_prefix(&self.paymaster_and_data)
    }

    fn call_gas_limit(&self) -> u128 {
        self.call_gas_limit
    }

    fn verification_gas_limit(&self) -> u128 {
        self.verification_gas_limit
    }

    fn total_verification_gas_limit(&self) -> u128 {
        self.verification_gas_limit
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
        let packed = (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            U256::from(self.call_gas_limit),
            U256::from(self.verification_gas_limit),
            U256::from(self.pre_verification_gas),
            U256::from(self.max_fee_per_gas),
            U256::from(self.max_priority_fee_per_gas),
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode();
        keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode())
    }

    fn abi_encode(&self) -> Vec<u8> {
        ContractUserOperation::from(self.clone()).abi_encode()
    }
}

impl From<UserOperation> for ContractUserOperation {
    fn from(op: UserOperation) -> Self {
        ContractUserOperation {
            sender: op.sender,
            nonce: op.nonce,
            initCode: op.init_code,
            callData: op.call_data,
            callGasLimit: U256::from(op.call_gas_limit),
            verificationGasLimit: U256::from(op.verification_gas_limit),
            preVerificationGas: U256::from(op.pre_verification_gas),
            maxFeePerGas: U256::from(op.max_fee_per_gas),
            maxPriorityFeePerGas: U256::from(op.max_priority_fee_per_gas),
            paymasterAndData: op.paymaster_and_data,
            signature: op.signature,
        }
    }
}

fn address_prefix(data: &Bytes) -> Option<Address> {
    if data.len() < 20 {
        None
    } else {
        Some(Address::from_slice(&data[..20]))
    }
}

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

//! User operation types for the two supported entry point versions.
//!
//! The wire shapes of entry point v0.6 and v0.7 operations are incompatible,
//! so a [`UserOperationVariant`] carries the tagged pair at every public
//! boundary. Version detection is structural: an operation is whichever
//! variant it was parsed into, never a flag.

use std::fmt::Debug;

use alloy_primitives::{Address, B256, U256};

use crate::GasFees;

/// User Operation types for Entry Point v0.6
pub mod v0_6;
/// User Operation types for Entry Point v0.7
pub mod v0_7;

/// ERC-4337 Entry point version
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EntryPointVersion {
    /// Version 0.6
    V0_6,
    /// Version 0.7
    V0_7,
}

/// Unique identifier for a user operation from a given sender
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UserOperationId {
    /// sender of user operation
    pub sender: Address,
    /// nonce of user operation
    pub nonce: U256,
}

/// User operation trait
pub trait UserOperation: Debug + Clone + Send + Sync + 'static {
    /// Get the entry point version for this UO
    fn entry_point_version(&self) -> EntryPointVersion;

    /// Get the user operation sender address
    fn sender(&self) -> Address;

    /// Get the user operation nonce
    fn nonce(&self) -> U256;

    /// Get the user operation factory address, if any
    fn factory(&self) -> Option<Address>;

    /// Get the user operation paymaster address, if any
    fn paymaster(&self) -> Option<Address>;

    /// Returns the call gas limit
    fn call_gas_limit(&self) -> u128;

    /// Returns the verification gas limit
    fn verification_gas_limit(&self) -> u128;

    /// Returns the total verification gas limit, including any paymaster
    /// verification gas
    fn total_verification_gas_limit(&self) -> u128;

    /// Returns the pre-verification gas
    fn pre_verification_gas(&self) -> u128;

    /// Returns the max fee per gas
    fn max_fee_per_gas(&self) -> u128;

    /// Returns the max priority fee per gas
    fn max_priority_fee_per_gas(&self) -> u128;

    /// Returns the declared fees of this operation
    fn gas_fees(&self) -> GasFees {
        GasFees {
            max_fee_per_gas: self.max_fee_per_gas(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas(),
        }
    }

    /// Hash a user operation with the given entry point and chain ID.
    ///
    /// The hash is used to uniquely identify a user operation in the entry point.
    /// It does not include the signature field.
    fn hash(&self, entry_point: Address, chain_id: u64) -> B256;

    /// Get the user operation id
    fn id(&self) -> UserOperationId {
        UserOperationId {
            sender: self.sender(),
            nonce: self.nonce(),
        }
    }

    /// ABI encode the operation in the form it is sent on chain.
    ///
    /// Used to compute the calldata portion of the pre-verification gas.
    fn abi_encode(&self) -> Vec<u8>;
}

/// User operation enum
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UserOperationVariant {
    /// User operation version 0.6
    V0_6(v0_6::UserOperation),
    /// User operation version 0.7
    V0_7(v0_7::UserOperation),
}

impl UserOperation for UserOperationVariant {
    fn entry_point_version(&self) -> EntryPointVersion {
        match self {
            UserOperationVariant::V0_6(_) => EntryPointVersion::V0_6,
            UserOperationVariant::V0_7(_) => EntryPointVersion::V0_7,
        }
    }

    fn sender(&self) -> Address {
        match self {
            UserOperationVariant::V0_6(op) => op.sender(),
            UserOperationVariant::V0_7(op) => op.sender(),
        }
    }

    fn nonce(&self) -> U256 {
        match self {
            UserOperationVariant::V0_6(op) => op.nonce(),
            UserOperationVariant::V0_7(op) => op.nonce(),
        }
    }

    fn factory(&self) -> Option<Address> {
        match self {
            UserOperationVariant::V0_6(op) => op.factory(),
            UserOperationVariant::V0_7(op) => op.factory(),
        }
    }

    fn paymaster(&self) -> Option<Address> {
        match self {
            UserOperationVariant::V0_6(op) => op.paymaster(),
            UserOperationVariant::V0_7(op) => op.paymaster(),
        }
    }

    fn call_gas_limit(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.call_gas_limit(),
            UserOperationVariant::V0_7(op) => op.call_gas_limit(),
        }
    }

    fn verification_gas_limit(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.verification_gas_limit(),
            UserOperationVariant::V0_7(op) => op.verification_gas_limit(),
        }
    }

    fn total_verification_gas_limit(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.total_verification_gas_limit(),
            UserOperationVariant::V0_7(op) => op.total_verification_gas_limit(),
        }
    }

    fn pre_verification_gas(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.pre_verification_gas(),
            UserOperationVariant::V0_7(op) => op.pre_verification_gas(),
        }
    }

    fn max_fee_per_gas(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.max_fee_per_gas(),
            UserOperationVariant::V0_7(op) => op.max_fee_per_gas(),
        }
    }

    fn max_priority_fee_per_gas(&self) -> u128 {
        match self {
            UserOperationVariant::V0_6(op) => op.max_priority_fee_per_gas(),
            UserOperationVariant::V0_7(op) => op.max_priority_fee_per_gas(),
        }
    }

    fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        match self {
            UserOperationVariant::V0_6(op) => op.hash(entry_point, chain_id),
            UserOperationVariant::V0_7(op) => op.hash(entry_point, chain_id),
        }
    }

    fn abi_encode(&self) -> Vec<u8> {
        match self {
            UserOperationVariant::V0_6(op) => op.abi_encode(),
            UserOperationVariant::V0_7(op) => op.abi_encode(),
        }
    }
}

impl From<v0_6::UserOperation> for UserOperationVariant {
    fn from(op: v0_6::UserOperation) -> Self {
        UserOperationVariant::V0_6(op)
    }
}

impl From<v0_7::UserOperation> for UserOperationVariant {
    fn from(op: v0_7::UserOperation) -> Self {
        UserOperationVariant::V0_7(op)
    }
}

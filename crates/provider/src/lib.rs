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

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! Opline providers
//!
//! A provider is a type that provides access to blockchain data and
//! functions: the narrow JSON-RPC surface the validation core needs, and
//! version-aware simulation drivers for the entry point contracts.
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export mocks for testing.

mod alloy;
pub use alloy::{
    AlloyEvmProvider, EntryPointProviderV0_6 as AlloyEntryPointProviderV0_6,
    EntryPointProviderV0_7 as AlloyEntryPointProviderV0_7,
};

mod traits;
#[cfg(any(test, feature = "test-utils"))]
pub use traits::{MockEvmProvider, MockSimulationProviderV0_6, MockSimulationProviderV0_7};
pub use traits::{
    BlockFees, EvmProvider, ExecutionResult, ProviderError, ProviderResult, RevertData,
    SimulationConfig, SimulationProvider,
};

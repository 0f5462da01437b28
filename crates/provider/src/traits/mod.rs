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

mod error;
pub use error::{ProviderError, ProviderResult, RevertData};

mod evm;
#[cfg(any(test, feature = "test-utils"))]
pub use evm::MockEvmProvider;
pub use evm::{BlockFees, EvmProvider};

mod entry_point;
pub use entry_point::{ExecutionResult, SimulationConfig, SimulationProvider};

#[cfg(any(test, feature = "test-utils"))]
mod test_utils;
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{MockSimulationProviderV0_6, MockSimulationProviderV0_7};

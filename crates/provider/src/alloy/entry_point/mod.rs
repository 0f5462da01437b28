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

use alloy_primitives::{uint, Address, Bytes, U256};
use alloy_rpc_types_eth::state::StateOverride;

mod v0_6;
pub use v0_6::EntryPointProvider as EntryPointProviderV0_6;

mod v0_7;
pub use v0_7::EntryPointProvider as EntryPointProviderV0_7;

// 1M ETH, far above any realistic prefund.
const SIMULATION_BALANCE: U256 = uint!(1_000_000_000_000_000_000_000_000_U256);

// Synthetic ETH balance for the sender so that simulation cannot fail on
// balance alone. Used only when balance overrides are enabled.
pub(crate) fn add_balance_override(state_override: &mut StateOverride, address: Address) {
    let account = state_override.entry(address).or_default();
    account.balance = Some(SIMULATION_BALANCE);
}

pub(crate) fn report_unexpected_revert(entry_point_version: &'static str, payload: &Bytes) {
    tracing::error!(
        "unexpected revert data from entry point {entry_point_version} simulation: {payload}"
    );
    metrics::counter!(
        "unexpected_simulation_response",
        "entry_point_version" => entry_point_version
    )
    .increment(1);
}

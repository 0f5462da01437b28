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

#![deny(unused_must_use, rust_2018_idioms)]

//! ABI bindings for the ERC-4337 EntryPoint contracts.
//!
//! Generated with `alloy_sol_macro::sol!` from the interfaces published by
//! eth-infinitism/account-abstraction for the v0.6 and v0.7 releases.

/// EntryPoint v0.6 types and interface
pub mod v0_6;
/// EntryPoint v0.7 types, interface, and the EntryPointSimulations companion
pub mod v0_7;

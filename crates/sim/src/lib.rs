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

//! Validation and fee policy for ERC-4337 user operations.
//!
//! Includes implementations for:
//!
//! - User operation validation against the entry point simulation entrypoints
//! - Gas price suggestion, tracking, and validation
//! - Pre-verification gas calculation

pub mod gas;
pub use gas::{GasPriceError, GasPriceManager, DEFAULT_GAS_PRICE_TIME_VALIDITY_SECONDS};

mod validation;
pub use validation::{
    Admission, ApiVersion, CodeHashes, Settings as ValidationSettings, StorageMap, ValidationError,
    Validator, ValidatorImpl,
};

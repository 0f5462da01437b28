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

//! Math utilities

use std::ops::{Add, Div, Mul};

use alloy_primitives::Uint;

/// Take a percentage of a number. `percent` may exceed 100.
pub fn percent<T>(n: T, percent: u32) -> T
where
    T: Mul<Output = T> + Div<Output = T> + From<u32>,
{
    (n * T::from(percent)) / T::from(100)
}

/// Increases a number by a percentage
pub fn increase_by_percent<T>(n: T, percent: u32) -> T
where
    T: Mul<Output = T> + Div<Output = T> + From<u32>,
{
    (n * T::from(100 + percent)) / T::from(100)
}

/// Increases a number by a percentage, rounding up
pub fn increase_by_percent_ceil<T>(n: T, percent: u32) -> T
where
    T: Add<Output = T> + Mul<Output = T> + Div<Output = T> + From<u32>,
{
    (n * T::from(100 + percent) + T::from(99)) / T::from(100)
}

/// Take a percentage of a uint
pub fn uint_percent<const BITS: usize, const LIMBS: usize>(
    n: Uint<BITS, LIMBS>,
    percent: u32,
) -> Uint<BITS, LIMBS> {
    (n * Uint::<BITS, LIMBS>::from(percent)) / Uint::<BITS, LIMBS>::from(100)
}

/// Increases a uint by a percentage
pub fn uint_increase_by_percent<const BITS: usize, const LIMBS: usize>(
    n: Uint<BITS, LIMBS>,
    percent: u32,
) -> Uint<BITS, LIMBS> {
    (n * Uint::<BITS, LIMBS>::from(100 + percent)) / Uint::<BITS, LIMBS>::from(100)
}

/// Increases a uint by a percentage, rounding up
pub fn uint_increase_by_percent_ceil<const BITS: usize, const LIMBS: usize>(
    n: Uint<BITS, LIMBS>,
    percent: u32,
) -> Uint<BITS, LIMBS> {
    (n * Uint::<BITS, LIMBS>::from(100 + percent) + Uint::<BITS, LIMBS>::from(99))
        / Uint::<BITS, LIMBS>::from(100)
}

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

use opline_utils::math;

/// Gas fees for a user operation or transaction
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasFees {
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: u128,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: u128,
}

impl GasFees {
    /// Scale both fees to a percentage of their current value. A percentage of
    /// 100 leaves the fees unchanged.
    pub fn scale_by_percent(self, percent: u32) -> Self {
        Self {
            max_fee_per_gas: math::percent(self.max_fee_per_gas, percent),
            max_priority_fee_per_gas: math::percent(self.max_priority_fee_per_gas, percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_by_percent() {
        let fees = GasFees {
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 50,
        };
        let scaled = fees.scale_by_percent(120);
        assert_eq!(scaled.max_fee_per_gas, 120);
        assert_eq!(scaled.max_priority_fee_per_gas, 60);
        assert_eq!(fees.scale_by_percent(100), fees);
    }
}

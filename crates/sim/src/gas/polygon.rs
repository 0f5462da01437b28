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

use async_trait::async_trait;
use opline_types::GasFees;
use serde::Deserialize;

use super::oracle::FeeSource;

/// Fee tier used when reading the gas station response
#[derive(Clone, Copy, Debug, Default)]
pub(crate) enum GasCategory {
    SafeLow,
    Standard,
    #[default]
    Fast,
    Fastest,
}

/// Fee source backed by the Polygon gas station HTTPS endpoints.
///
/// The station quotes fees in gwei per tier; by default the `fast` tier is
/// used.
pub(crate) struct GasStationFeeSource {
    url: String,
    category: GasCategory,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasStationResponse {
    safe_low: GasStationTier,
    standard: GasStationTier,
    fast: GasStationTier,
    fastest: GasStationTier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GasStationTier {
    /// Max fee per gas in gwei
    max_fee_per_gas: f64,
    /// Max priority fee per gas in gwei
    max_priority_fee_per_gas: f64,
}

impl GasStationFeeSource {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: GasCategory::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Sets the tier to be used when reading the gas station response
    pub(crate) fn category(mut self, category: GasCategory) -> Self {
        self.category = category;
        self
    }

    fn tier<'a>(&self, response: &'a GasStationResponse) -> &'a GasStationTier {
        match self.category {
            GasCategory::SafeLow => &response.safe_low,
            GasCategory::Standard => &response.standard,
            GasCategory::Fast => &response.fast,
            GasCategory::Fastest => &response.fastest,
        }
    }
}

#[async_trait]
impl FeeSource for GasStationFeeSource {
    async fn estimate_fees(&self) -> anyhow::Result<GasFees> {
        let response: GasStationResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let tier = self.tier(&response);
        Ok(GasFees {
            max_fee_per_gas: gwei_to_wei(tier.max_fee_per_gas)?,
            max_priority_fee_per_gas: gwei_to_wei(tier.max_priority_fee_per_gas)?,
        })
    }
}

fn gwei_to_wei(gwei: f64) -> anyhow::Result<u128> {
    anyhow::ensure!(
        gwei.is_finite() && gwei >= 0.0,
        "gas station returned an invalid gwei value: {gwei}"
    );
    Ok((gwei * 1e9).round() as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "safeLow": {"maxFeePerGas": 30.1, "maxPriorityFeePerGas": 30.0},
        "standard": {"maxFeePerGas": 31.5, "maxPriorityFeePerGas": 31.0},
        "fast": {"maxFeePerGas": 33.75, "maxPriorityFeePerGas": 32.5},
        "fastest": {"maxFeePerGas": 40.0, "maxPriorityFeePerGas": 38.0}
    }"#;

    #[test]
    fn test_parse_gas_station_response() {
        let response: GasStationResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.fast.max_fee_per_gas, 33.75);
        assert_eq!(response.fast.max_priority_fee_per_gas, 32.5);
        assert_eq!(response.safe_low.max_priority_fee_per_gas, 30.0);
        assert_eq!(response.standard.max_fee_per_gas, 31.5);
        assert_eq!(response.fastest.max_fee_per_gas, 40.0);
    }

    #[test]
    fn test_rejects_malformed_response() {
        // missing tier
        serde_json::from_str::<GasStationResponse>(
            r#"{"safeLow": {"maxFeePerGas": 1.0, "maxPriorityFeePerGas": 1.0}}"#,
        )
        .unwrap_err();
        // unknown tier field
        serde_json::from_str::<GasStationTier>(
            r#"{"maxFeePerGas": 1.0, "maxPriorityFeePerGas": 1.0, "burnRate": 2}"#,
        )
        .unwrap_err();
    }

    #[test]
    fn test_tier_selection() {
        let response: GasStationResponse = serde_json::from_str(SAMPLE).unwrap();
        let tiers = [
            (GasCategory::SafeLow, 30.1),
            (GasCategory::Standard, 31.5),
            (GasCategory::Fast, 33.75),
            (GasCategory::Fastest, 40.0),
        ];
        for (category, expected) in tiers {
            let source = GasStationFeeSource::new("http://localhost").category(category);
            assert_eq!(source.tier(&response).max_fee_per_gas, expected);
        }
    }

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei(33.75).unwrap(), 33_750_000_000);
        assert_eq!(gwei_to_wei(0.0).unwrap(), 0);
        gwei_to_wei(f64::NAN).unwrap_err();
        gwei_to_wei(-1.0).unwrap_err();
    }
}

use crate::error::ExchangeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub precision: u8, // Decimal places shown for amounts of this asset
}

/// An amount of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Money {
    pub asset: AssetDescriptor,
    tokens: f64,
}

impl Money {
    pub fn new(asset: AssetDescriptor, tokens: f64) -> Self {
        Self { asset, tokens }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRate {
    rate: f64,
}

impl ConversionRate {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn exchange(&self, amount: f64) -> f64 {
        amount * self.rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub from: String,
    pub to: String,
    pub rate: f64,
}

/// Asset metadata and conversion rates.
pub trait AssetService {
    fn asset_info(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<AssetDescriptor, ExchangeError>> + Send;

    fn rate(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<ConversionRate, ExchangeError>> + Send;
}

/// Read access to the user's settings.
pub trait SettingsSource {
    fn setting(&self, key: &str) -> Option<String>;
}

/// Asset table and rates known up front, usually from the settings file.
/// A missing direct rate falls back to the inverse of the reverse pair.
#[derive(Debug, Clone, Default)]
pub struct StaticAssets {
    assets: HashMap<String, AssetDescriptor>,
    rates: HashMap<(String, String), f64>,
}

impl StaticAssets {
    pub fn new(assets: &[AssetDescriptor], rates: &[RateEntry]) -> Self {
        Self {
            assets: assets
                .iter()
                .map(|asset| (asset.id.clone(), asset.clone()))
                .collect(),
            rates: rates
                .iter()
                .map(|entry| ((entry.from.clone(), entry.to.clone()), entry.rate))
                .collect(),
        }
    }

    pub fn lookup(&self, id: &str) -> Result<AssetDescriptor, ExchangeError> {
        self.assets
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownAsset(id.to_string()))
    }

    pub fn lookup_rate(&self, from: &str, to: &str) -> Result<ConversionRate, ExchangeError> {
        if from == to {
            return Ok(ConversionRate::new(1.0));
        }
        if let Some(rate) = self.rates.get(&(from.to_string(), to.to_string())) {
            return Ok(ConversionRate::new(*rate));
        }
        match self.rates.get(&(to.to_string(), from.to_string())) {
            Some(rate) if *rate != 0.0 => Ok(ConversionRate::new(1.0 / rate)),
            _ => Err(ExchangeError::RateUnavailable {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl AssetService for StaticAssets {
    async fn asset_info(&self, id: &str) -> Result<AssetDescriptor, ExchangeError> {
        self.lookup(id)
    }

    async fn rate(&self, from: &str, to: &str) -> Result<ConversionRate, ExchangeError> {
        self.lookup_rate(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, precision: u8) -> AssetDescriptor {
        AssetDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            precision,
        }
    }

    fn table() -> StaticAssets {
        StaticAssets::new(
            &[asset("WAVES", 8), asset("USD", 2)],
            &[RateEntry {
                from: "WAVES".to_string(),
                to: "USD".to_string(),
                rate: 2.5,
            }],
        )
    }

    #[test]
    fn test_direct_and_inverse_rates() {
        let assets = table();
        assert_eq!(assets.lookup_rate("WAVES", "USD").unwrap().exchange(4.0), 10.0);
        let back = assets.lookup_rate("USD", "WAVES").unwrap().exchange(10.0);
        assert!((back - 4.0).abs() < 1e-9);
        assert_eq!(assets.lookup_rate("USD", "USD").unwrap().exchange(3.0), 3.0);
    }

    #[test]
    fn test_missing_rate_and_asset() {
        let assets = table();
        assert_eq!(
            assets.lookup_rate("WAVES", "EUR"),
            Err(ExchangeError::RateUnavailable {
                from: "WAVES".to_string(),
                to: "EUR".to_string()
            })
        );
        assert_eq!(
            assets.lookup("EUR"),
            Err(ExchangeError::UnknownAsset("EUR".to_string()))
        );
    }

    #[tokio::test]
    async fn test_asset_service_impl() {
        let assets = table();
        assert_eq!(assets.asset_info("USD").await.unwrap().precision, 2);
        assert!(assets.rate("WAVES", "USD").await.is_ok());
    }
}

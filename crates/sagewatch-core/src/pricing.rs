use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which price table an instance type is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceCategory {
    Endpoint,
    Notebook,
    Studio,
    Canvas,
}

impl fmt::Display for PriceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriceCategory::Endpoint => "Endpoint",
            PriceCategory::Notebook => "Notebook",
            PriceCategory::Studio => "Studio",
            PriceCategory::Canvas => "Canvas",
        };
        f.write_str(label)
    }
}

/// Price source consumed by the cost engine.
///
/// An unknown instance type is not an error; callers treat `None` as
/// "pricing unknown" and fall back to a zero rate.
pub trait PriceLookup {
    /// Hourly on-demand rate for one instance of `instance_type`.
    fn hourly_rate(&self, category: PriceCategory, instance_type: &str) -> Option<f64>;

    /// Block storage price in $/GB-month.
    fn storage_rate(&self) -> f64;
}

const DEFAULT_INSTANCE_PRICES: &[(&str, f64)] = &[
    ("ml.t2.medium", 0.05),
    ("ml.t2.large", 0.10),
    ("ml.t2.xlarge", 0.20),
    ("ml.t3.medium", 0.05),
    ("ml.t3.large", 0.10),
    ("ml.t3.xlarge", 0.20),
    ("ml.m4.xlarge", 0.28),
    ("ml.m5.large", 0.13),
    ("ml.m5.xlarge", 0.27),
    ("ml.m5.2xlarge", 0.54),
    ("ml.c5.large", 0.12),
    ("ml.c5.xlarge", 0.24),
    ("ml.c5.2xlarge", 0.48),
    ("ml.p3.2xlarge", 3.825),
    ("ml.g4dn.xlarge", 0.736),
];

const DEFAULT_WORKBENCH_PRICES: &[(&str, f64)] = &[
    ("ml.t3.medium", 0.05),
    ("ml.m5.large", 0.13),
    ("ml.m5.xlarge", 0.27),
    ("ml.m5.2xlarge", 0.54),
    ("ml.c5.large", 0.12),
    ("ml.c5.xlarge", 0.24),
    ("ml.c5.2xlarge", 0.48),
    ("ml.g4dn.xlarge", 0.736),
    ("ml.p3.2xlarge", 3.825),
];

const DEFAULT_STORAGE_PRICE: f64 = 0.10;

fn to_map(prices: &[(&str, f64)]) -> HashMap<String, f64> {
    prices
        .iter()
        .map(|(instance_type, price)| (instance_type.to_string(), *price))
        .collect()
}

fn default_instance_prices() -> HashMap<String, f64> {
    to_map(DEFAULT_INSTANCE_PRICES)
}

fn default_workbench_prices() -> HashMap<String, f64> {
    to_map(DEFAULT_WORKBENCH_PRICES)
}

/// Storage section of a price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePrices {
    #[serde(default = "default_storage_price")]
    pub ebs: f64,
}

fn default_storage_price() -> f64 {
    DEFAULT_STORAGE_PRICE
}

impl Default for StoragePrices {
    fn default() -> Self {
        Self {
            ebs: DEFAULT_STORAGE_PRICE,
        }
    }
}

/// Hourly prices per instance type for each resource category.
///
/// Sections omitted from a deserialized table fall back to the built-in
/// defaults, so a price file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(default = "default_instance_prices")]
    pub endpoints: HashMap<String, f64>,
    #[serde(default = "default_instance_prices")]
    pub notebooks: HashMap<String, f64>,
    #[serde(default = "default_workbench_prices")]
    pub studio: HashMap<String, f64>,
    #[serde(default = "default_workbench_prices")]
    pub canvas: HashMap<String, f64>,
    #[serde(default)]
    pub storage: StoragePrices,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            endpoints: default_instance_prices(),
            notebooks: default_instance_prices(),
            studio: default_workbench_prices(),
            canvas: default_workbench_prices(),
            storage: StoragePrices::default(),
        }
    }
}

impl PriceTable {
    fn prices_for(&self, category: PriceCategory) -> &HashMap<String, f64> {
        match category {
            PriceCategory::Endpoint => &self.endpoints,
            PriceCategory::Notebook => &self.notebooks,
            PriceCategory::Studio => &self.studio,
            PriceCategory::Canvas => &self.canvas,
        }
    }

    /// Reject prices that would make cost figures meaningless.
    pub fn validate(&self) -> Result<()> {
        let sections = [
            PriceCategory::Endpoint,
            PriceCategory::Notebook,
            PriceCategory::Studio,
            PriceCategory::Canvas,
        ];

        for category in sections {
            for (instance_type, price) in self.prices_for(category) {
                if !price.is_finite() || *price < 0.0 {
                    return Err(CoreError::ValidationFailed(format!(
                        "{} price for {} must be a non-negative number, got {}",
                        category, instance_type, price
                    )));
                }
            }
        }

        if !self.storage.ebs.is_finite() || self.storage.ebs < 0.0 {
            return Err(CoreError::ValidationFailed(format!(
                "storage price must be a non-negative number, got {}",
                self.storage.ebs
            )));
        }

        Ok(())
    }
}

impl PriceLookup for PriceTable {
    fn hourly_rate(&self, category: PriceCategory, instance_type: &str) -> Option<f64> {
        self.prices_for(category).get(instance_type).copied()
    }

    fn storage_rate(&self) -> f64 {
        self.storage.ebs
    }
}

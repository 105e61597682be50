use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Product {
    pub description: String,
    pub unit_price: Decimal,
    /// Overrides the company default tax rate
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
}

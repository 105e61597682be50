use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::numbering::DEFAULT_TEMPLATE;
use crate::plan::PlanTier;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub company: Company,
    pub invoice: InvoiceSettings,
    #[serde(default)]
    pub numbering: NumberingSettings,
    #[serde(default)]
    pub plan: PlanSettings,
}

/// Company profile printed on every invoice
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Company {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub legal_text: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InvoiceSettings {
    pub currency_symbol: String,
    /// Tax percentage applied when a product does not set its own
    #[serde(default = "default_tax_rate")]
    pub default_tax_rate: Decimal,
}

fn default_tax_rate() -> Decimal {
    Decimal::from(21)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NumberingSettings {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for NumberingSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    DEFAULT_TEMPLATE.to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PlanSettings {
    /// Tier name as reported by the billing provider
    pub tier: String,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            tier: PlanTier::Free.to_string(),
        }
    }
}

impl PlanSettings {
    pub fn tier(&self) -> Result<PlanTier> {
        self.tier.parse()
    }
}

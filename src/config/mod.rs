mod client;
mod company;
mod product;
mod state;

pub use client::Client;
pub use company::{Company, Config, InvoiceSettings, NumberingSettings, PlanSettings};
pub use product::Product;
pub use state::{HistoryEntry, State};

use crate::error::{InvoiceError, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (platform config dir, else ~/.invoicer/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "invoicer") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
        InvoiceError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".invoicer"))
}

fn read_toml<T: DeserializeOwned>(path: PathBuf) -> Result<T> {
    if !path.exists() {
        return Err(InvoiceError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| InvoiceError::ConfigParse { path, source: e })
}

fn write_toml<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .map_err(|e| InvoiceError::Serialize(path.display().to_string(), e.to_string()))?;
    fs::write(path, content)?;
    Ok(())
}

/// Load the main config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    read_toml(config_dir.join("config.toml"))
}

/// Load clients.toml keyed by client id
pub fn load_clients(config_dir: &Path) -> Result<BTreeMap<String, Client>> {
    read_toml(config_dir.join("clients.toml"))
}

pub fn save_clients(config_dir: &Path, clients: &BTreeMap<String, Client>) -> Result<()> {
    write_toml(config_dir.join("clients.toml"), clients)
}

/// Load products.toml keyed by product id
pub fn load_products(config_dir: &Path) -> Result<BTreeMap<String, Product>> {
    read_toml(config_dir.join("products.toml"))
}

/// Load state.toml (default state if missing)
pub fn load_state(config_dir: &Path) -> Result<State> {
    let path = config_dir.join("state.toml");
    if !path.exists() {
        return Ok(State::default());
    }
    read_toml(path)
}

/// Save state.toml
pub fn save_state(config_dir: &Path, state: &State) -> Result<()> {
    write_toml(config_dir.join("state.toml"), state)
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[company]
name = "Your Company Name"
tax_id = "B12345678"
address = "123 Business Street"
city = "Madrid"
zip = "28001"
country = "Spain"
email = "billing@yourcompany.com"
# phone = "+34 600 000 000"          # optional
# iban = "ES00 0000 0000 0000 0000"  # optional, printed for bank transfers
# payment_terms = "Net 30 days"      # optional

[invoice]
currency_symbol = "€"
default_tax_rate = 21  # percent, used when a product has no tax_rate

[numbering]
prefix = ""                 # e.g., "FAC-"
format = "{year}-{seq:04}"  # e.g., 2026-0001

[plan]
tier = "free"  # free, starter or pro
"#;

/// Template content for clients.toml
pub const CLIENTS_TEMPLATE: &str = r#"# Define your clients here. The table name (e.g., [acme]) is used
# as the client identifier in the issue command.
#
# Example:
#   invoicer issue --client acme --item consulting:8

[example-client]
name = "Example Client S.L."
tax_id = "B87654321"            # optional
email = "billing@example.com"
address = "456 Client Avenue"   # optional
city = "Barcelona"              # optional
zip = "08001"                   # optional
"#;

/// Template content for products.toml
pub const PRODUCTS_TEMPLATE: &str = r#"# Define your products and services here. The table name (e.g., [consulting])
# is used as the product identifier in the issue command.
#
# Example:
#   invoicer issue --client acme --item consulting:8 --item development:40

[consulting]
description = "Technical Consulting"
unit_price = 150.00
unit = "hour"

[development]
description = "Software Development"
unit_price = 125.00
unit = "hour"

[training]
description = "On-site Training"
unit_price = 500.00
tax_rate = 0     # exempt, overrides the default tax rate
unit = "day"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_parse() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.numbering.format, "{year}-{seq:04}");
        assert_eq!(config.plan.tier().unwrap(), crate::plan::PlanTier::Free);

        let clients: BTreeMap<String, Client> = toml::from_str(CLIENTS_TEMPLATE).unwrap();
        assert!(clients.contains_key("example-client"));

        let products: BTreeMap<String, Product> = toml::from_str(PRODUCTS_TEMPLATE).unwrap();
        assert_eq!(products["consulting"].unit_price, rust_decimal::Decimal::from(150));
        assert_eq!(products["training"].tax_rate, Some(rust_decimal::Decimal::ZERO));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"[company]
name = "X"
tax_id = "1"
address = "a"
city = "c"
zip = "z"
country = "ES"
email = "x@example.com"

[invoice]
currency_symbol = "$"
"#,
        )
        .unwrap();
        assert_eq!(config.numbering.prefix, "");
        assert_eq!(config.plan.tier, "free");
        assert_eq!(config.invoice.default_tax_rate, rust_decimal::Decimal::from(21));
    }

    #[test]
    fn unknown_tier_is_not_defaulted() {
        let settings = PlanSettings {
            tier: "gold".to_string(),
        };
        assert!(matches!(
            settings.tier(),
            Err(InvoiceError::UnknownTier(t)) if t == "gold"
        ));
    }
}

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The line field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    Quantity,
    UnitPrice,
    TaxRatePercent,
}

impl fmt::Display for LineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineField::Quantity => "quantity",
            LineField::UnitPrice => "unit_price",
            LineField::TaxRatePercent => "tax_rate_percent",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum InvoiceError {
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidLineInput {
        field: LineField,
        value: String,
        reason: String,
    },

    #[error("Invalid number format '{template}': {reason}")]
    InvalidNumberFormat { template: String, reason: String },

    #[error("Invoice sequence is exhausted and cannot be incremented")]
    SequenceExhausted,

    #[error("Unknown plan tier '{0}'. Expected one of: free, starter, pro")]
    UnknownTier(String),

    #[error("Unknown resource type '{0}'. Expected one of: clients, invoices")]
    UnknownResourceType(String),

    #[error("You have reached the limit of {limit} {resource} on the {tier} plan. Upgrade your plan to add more.")]
    QuotaExceeded {
        resource: String,
        limit: u64,
        tier: String,
    },

    #[error("The '{feature}' feature is not available on the {tier} plan")]
    FeatureUnavailable { feature: String, tier: String },

    #[error("Config directory not found at {0}. Run 'invoicer init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize {0}: {1}")]
    Serialize(String, String),

    #[error("Client '{0}' not found in clients.toml")]
    ClientNotFound(String),

    #[error("Client '{0}' already exists in clients.toml")]
    ClientExists(String),

    #[error("Product '{0}' not found in products.toml")]
    ProductNotFound(String),

    #[error("Invalid item format '{0}'. Expected 'product:quantity' (e.g., 'consulting:8')")]
    InvalidItemFormat(String),

    #[error("No items specified. Use --item <product>:<quantity> to add line items.")]
    NoItems,

    #[error("Unknown invoice status '{0}'. Expected one of: draft, sent, paid, cancelled")]
    UnknownStatus(String),

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Invoice '{0}' not found in history")]
    InvoiceNotFound(String),

    #[error("Invalid invoice index '{0}'. Use 'invoicer list' to see available invoices.")]
    InvalidInvoiceIndex(String),
}

impl InvoiceError {
    pub(crate) fn invalid_line(field: LineField, value: impl fmt::Display, reason: &str) -> Self {
        InvoiceError::InvalidLineInput {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_format(template: &str, reason: impl Into<String>) -> Self {
        InvoiceError::InvalidNumberFormat {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InvoiceError>;

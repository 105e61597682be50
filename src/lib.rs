pub mod config;
pub mod error;
pub mod invoice;
pub mod numbering;
pub mod plan;

pub use config::{Client, Company, Config, HistoryEntry, Product, State};
pub use error::{InvoiceError, LineField, Result};
pub use invoice::{aggregate, compute_line, Invoice, InvoiceLine, InvoiceStatus, InvoiceTotals, LineTotals};
pub use numbering::{NumberTemplate, NumberingState};
pub use plan::{check_quota, evaluate, evaluate_named, Feature, Limit, PlanTier, QuotaUsage, ResourceType};

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{InvoiceError, Result};

/// Usage at or above this percentage counts as near the limit
pub const NEAR_LIMIT_PERCENT: u64 = 80;

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
}

impl PlanTier {
    pub fn limit(self, resource: ResourceType) -> Limit {
        match (self, resource) {
            (PlanTier::Free, ResourceType::Clients) => Limit::Max(5),
            (PlanTier::Free, ResourceType::InvoicesPerMonth) => Limit::Max(10),
            (PlanTier::Starter, ResourceType::Clients) => Limit::Max(50),
            (PlanTier::Starter, ResourceType::InvoicesPerMonth) => Limit::Max(100),
            (PlanTier::Pro, _) => Limit::Unlimited,
        }
    }

    pub fn has_feature(self, feature: Feature) -> bool {
        match feature {
            Feature::PdfExport => matches!(self, PlanTier::Starter | PlanTier::Pro),
            Feature::Analytics | Feature::CustomTemplates => self == PlanTier::Pro,
        }
    }

    /// Fail with `FeatureUnavailable` unless the tier includes `feature`.
    pub fn require_feature(self, feature: Feature) -> Result<()> {
        if self.has_feature(feature) {
            Ok(())
        } else {
            Err(InvoiceError::FeatureUnavailable {
                feature: feature.to_string(),
                tier: self.to_string(),
            })
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
        };
        f.write_str(name)
    }
}

impl FromStr for PlanTier {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "free_user" => Ok(PlanTier::Free),
            "starter" => Ok(PlanTier::Starter),
            "pro" => Ok(PlanTier::Pro),
            _ => Err(InvoiceError::UnknownTier(s.to_string())),
        }
    }
}

/// A resource counted against a plan limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Clients,
    InvoicesPerMonth,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [ResourceType::Clients, ResourceType::InvoicesPerMonth];
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Clients => "clients",
            ResourceType::InvoicesPerMonth => "invoices per month",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceType {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clients" | "clientes" => Ok(ResourceType::Clients),
            "invoices" | "invoices_per_month" | "facturas" | "facturas_por_mes" => {
                Ok(ResourceType::InvoicesPerMonth)
            }
            _ => Err(InvoiceError::UnknownResourceType(s.to_string())),
        }
    }
}

/// Paid features gated by tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    PdfExport,
    Analytics,
    CustomTemplates,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::PdfExport => "pdf_export",
            Feature::Analytics => "analytics",
            Feature::CustomTemplates => "custom_templates",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Max(u64),
    Unlimited,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Max(n) => write!(f, "{n}"),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Limit::Max(n) => serializer.serialize_u64(*n),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Result of evaluating usage against a tier's limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub tier: PlanTier,
    pub resource: ResourceType,
    pub current: u64,
    pub limit: Limit,
    pub percent_used: u64,
    pub near_limit: bool,
    pub at_limit: bool,
}

impl QuotaUsage {
    /// How many more resources may be created, `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        match self.limit {
            Limit::Max(max) => Some(max.saturating_sub(self.current)),
            Limit::Unlimited => None,
        }
    }
}

/// Percentage of `limit` used, rounded half-up to a whole number.
fn percent_of(current: u64, limit: u64) -> u64 {
    let current = u128::from(current);
    let limit = u128::from(limit);
    let percent = (200 * current + limit) / (2 * limit);
    u64::try_from(percent).unwrap_or(u64::MAX)
}

/// Evaluate `current_count` against the tier's limit for `resource`.
pub fn evaluate(tier: PlanTier, resource: ResourceType, current_count: u64) -> QuotaUsage {
    let limit = tier.limit(resource);
    let usage = match limit {
        Limit::Unlimited => QuotaUsage {
            tier,
            resource,
            current: current_count,
            limit,
            percent_used: 0,
            near_limit: false,
            at_limit: false,
        },
        Limit::Max(max) => {
            let percent_used = percent_of(current_count, max);
            QuotaUsage {
                tier,
                resource,
                current: current_count,
                limit,
                percent_used,
                near_limit: percent_used >= NEAR_LIMIT_PERCENT,
                at_limit: current_count >= max,
            }
        }
    };

    tracing::debug!(
        tier = %tier,
        resource = %resource,
        current = current_count,
        limit = %usage.limit,
        percent_used = usage.percent_used,
        "evaluated plan quota"
    );

    usage
}

/// Same as [`evaluate`] for names coming from an external billing service.
/// Unknown names fail; they are never mapped to a default tier.
pub fn evaluate_named(tier: &str, resource: &str, current_count: u64) -> Result<QuotaUsage> {
    let tier: PlanTier = tier.parse()?;
    let resource: ResourceType = resource.parse()?;
    Ok(evaluate(tier, resource, current_count))
}

/// Evaluate and fail with `QuotaExceeded` when another resource may not be
/// created.
pub fn check_quota(tier: PlanTier, resource: ResourceType, current_count: u64) -> Result<QuotaUsage> {
    let usage = evaluate(tier, resource, current_count);
    match usage.limit {
        Limit::Max(max) if usage.at_limit => {
            tracing::warn!(tier = %tier, resource = %resource, limit = max, "plan limit reached");
            Err(InvoiceError::QuotaExceeded {
                resource: resource.to_string(),
                limit: max,
                tier: tier.to_string(),
            })
        }
        _ => {
            if usage.near_limit {
                tracing::warn!(
                    tier = %tier,
                    resource = %resource,
                    percent_used = usage.percent_used,
                    "approaching plan limit"
                );
            }
            Ok(usage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_clients_at_limit() {
        let usage = evaluate(PlanTier::Free, ResourceType::Clients, 5);
        assert_eq!(usage.limit, Limit::Max(5));
        assert_eq!(usage.percent_used, 100);
        assert!(usage.at_limit);
        assert!(usage.near_limit);
        assert_eq!(usage.remaining(), Some(0));
    }

    #[test]
    fn limit_table() {
        use PlanTier::*;
        use ResourceType::*;
        assert_eq!(Free.limit(InvoicesPerMonth), Limit::Max(10));
        assert_eq!(Starter.limit(Clients), Limit::Max(50));
        assert_eq!(Starter.limit(InvoicesPerMonth), Limit::Max(100));
        assert_eq!(Pro.limit(Clients), Limit::Unlimited);
        assert_eq!(Pro.limit(InvoicesPerMonth), Limit::Unlimited);
    }

    #[test]
    fn near_limit_starts_at_eighty_percent() {
        let usage = evaluate(PlanTier::Free, ResourceType::InvoicesPerMonth, 7);
        assert_eq!(usage.percent_used, 70);
        assert!(!usage.near_limit);

        let usage = evaluate(PlanTier::Free, ResourceType::InvoicesPerMonth, 8);
        assert_eq!(usage.percent_used, 80);
        assert!(usage.near_limit);
        assert!(!usage.at_limit);
    }

    #[test]
    fn percent_rounds_half_up() {
        // 39.5% -> 40
        assert_eq!(percent_of(79, 200), 40);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        // 79.5% rounds up into near-limit territory
        assert_eq!(percent_of(159, 200), 80);
    }

    #[test]
    fn over_limit_counts_are_reported_not_clamped() {
        let usage = evaluate(PlanTier::Free, ResourceType::Clients, 12);
        assert_eq!(usage.percent_used, 240);
        assert!(usage.at_limit);
        assert_eq!(usage.remaining(), Some(0));
    }

    #[test]
    fn pro_is_never_limited() {
        for count in [0, 1, 10_000, u64::MAX] {
            for resource in ResourceType::ALL {
                let usage = evaluate(PlanTier::Pro, resource, count);
                assert_eq!(usage.percent_used, 0);
                assert!(!usage.near_limit);
                assert!(!usage.at_limit);
                assert_eq!(usage.remaining(), None);
            }
        }
    }

    #[test]
    fn named_evaluation_rejects_unknown_values() {
        assert!(matches!(
            evaluate_named("enterprise", "clients", 1),
            Err(InvoiceError::UnknownTier(t)) if t == "enterprise"
        ));
        assert!(matches!(
            evaluate_named("free", "products", 1),
            Err(InvoiceError::UnknownResourceType(r)) if r == "products"
        ));
        let usage = evaluate_named("free_user", "facturas", 10).unwrap();
        assert_eq!(usage.tier, PlanTier::Free);
        assert!(usage.at_limit);
    }

    #[test]
    fn check_quota_blocks_at_limit() {
        assert!(check_quota(PlanTier::Free, ResourceType::Clients, 4).is_ok());
        let err = check_quota(PlanTier::Free, ResourceType::Clients, 5).unwrap_err();
        assert!(matches!(err, InvoiceError::QuotaExceeded { limit: 5, .. }));
        assert!(err.to_string().contains("limit of 5 clients on the free plan"));
        assert!(check_quota(PlanTier::Pro, ResourceType::Clients, 5_000).is_ok());
    }

    #[test]
    fn features_by_tier() {
        assert!(!PlanTier::Free.has_feature(Feature::PdfExport));
        assert!(PlanTier::Starter.has_feature(Feature::PdfExport));
        assert!(!PlanTier::Starter.has_feature(Feature::Analytics));
        assert!(PlanTier::Pro.has_feature(Feature::CustomTemplates));
        assert!(matches!(
            PlanTier::Starter.require_feature(Feature::Analytics),
            Err(InvoiceError::FeatureUnavailable { .. })
        ));
    }

    #[test]
    fn limit_serializes_as_number_or_unlimited() {
        let usage = evaluate(PlanTier::Pro, ResourceType::Clients, 3);
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json["limit"], "unlimited");
        assert_eq!(json["resource"], "clients");

        let usage = evaluate(PlanTier::Free, ResourceType::InvoicesPerMonth, 3);
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json["limit"], 10);
        assert_eq!(json["tier"], "free");
    }
}

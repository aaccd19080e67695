use models::DeploymentTier;

/// Static plan id -> pricing tier table. Raw plan ids show up when the
/// billing integration hands us a subscription before the catalog lookup has
/// happened; they resolve to the same tier names as direct input.
static PLAN_TIERS: &[(&str, &str)] = &[
    ("plan-free", "free"),
    ("plan-starter", "starter"),
    ("plan-basic-monthly", "basic"),
    ("plan-basic-annual", "basic"),
    ("plan-standard-monthly", "standard"),
    ("plan-standard-annual", "standard"),
    ("plan-pro-monthly", "pro"),
    ("plan-pro-annual", "pro"),
    ("plan-premium-monthly", "premium"),
    ("plan-premium-annual", "premium"),
    ("plan-enterprise-annual", "enterprise"),
    ("plan-dedicated-annual", "dedicated"),
    ("plan-hybrid-annual", "hybrid"),
];

/// Map a pricing tier name or raw plan id to a deployment tier.
///
/// Total over arbitrary strings: unrecognized input degrades to `Pooled`
/// with a warning, because provisioning must never fail solely on an
/// unknown tier name.
pub fn resolve_tier(plan: &str) -> DeploymentTier {
    let normalized = plan.trim().to_ascii_lowercase();
    let tier_name = PLAN_TIERS
        .iter()
        .find(|(id, _)| *id == normalized)
        .map(|(_, tier)| *tier)
        .unwrap_or(normalized.as_str());

    match tier_name {
        "enterprise" | "dedicated" => DeploymentTier::Silo,
        "hybrid" => DeploymentTier::Bridge,
        "premium" | "standard" | "basic" | "free" | "starter" | "pro" => DeploymentTier::Pooled,
        other => {
            tracing::warn!(plan = %other, "unrecognized plan tier, defaulting to pooled");
            DeploymentTier::Pooled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enterprise_and_dedicated_resolve_to_silo() {
        assert_eq!(resolve_tier("enterprise"), DeploymentTier::Silo);
        assert_eq!(resolve_tier("DEDICATED"), DeploymentTier::Silo);
        assert_eq!(resolve_tier("plan-enterprise-annual"), DeploymentTier::Silo);
    }

    #[test]
    fn hybrid_resolves_to_bridge() {
        assert_eq!(resolve_tier("hybrid"), DeploymentTier::Bridge);
        assert_eq!(resolve_tier("plan-hybrid-annual"), DeploymentTier::Bridge);
    }

    #[test]
    fn shared_tiers_resolve_to_pooled() {
        for tier in ["free", "starter", "basic", "standard", "pro", "premium"] {
            assert_eq!(resolve_tier(tier), DeploymentTier::Pooled, "tier {tier}");
        }
        assert_eq!(resolve_tier("plan-premium-monthly"), DeploymentTier::Pooled);
    }

    #[test]
    fn resolution_is_total_and_case_insensitive() {
        assert_eq!(resolve_tier("plan-xyz"), DeploymentTier::Pooled);
        assert_eq!(resolve_tier(""), DeploymentTier::Pooled);
        assert_eq!(resolve_tier("  Enterprise  "), DeploymentTier::Silo);
        assert_eq!(resolve_tier("🦀"), DeploymentTier::Pooled);
    }
}

//! Plan tiers, numeric usage caps, and derived capability flags.
//!
//! Limits come from a `subscription_plans` row when one exists; otherwise
//! the hardcoded per-tier defaults below apply. A user with no active,
//! non-expired subscription is treated as free tier.

use serde::{Deserialize, Serialize};

/// Named subscription level. Unknown strings parse to [`PlanTier::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Basic,
    Pro,
    Business,
}

impl PlanTier {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "basic" => PlanTier::Basic,
            "pro" => PlanTier::Pro,
            "business" => PlanTier::Business,
            _ => PlanTier::Free,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Business => "business",
        }
    }

    /// Hardcoded fallback caps for the tier, used when no plan row exists.
    #[must_use]
    pub fn default_limits(self) -> PlanLimits {
        match self {
            PlanTier::Free => PlanLimits {
                max_posts_per_month: Some(10),
                max_ai_generations_per_month: Some(5),
                max_images_per_post: Some(1),
                max_brands: Some(1),
                max_social_accounts: Some(2),
            },
            PlanTier::Basic => PlanLimits {
                max_posts_per_month: Some(60),
                max_ai_generations_per_month: Some(50),
                max_images_per_post: Some(4),
                max_brands: Some(3),
                max_social_accounts: Some(6),
            },
            PlanTier::Pro => PlanLimits {
                max_posts_per_month: Some(300),
                max_ai_generations_per_month: Some(300),
                max_images_per_post: Some(10),
                max_brands: Some(10),
                max_social_accounts: Some(20),
            },
            PlanTier::Business => PlanLimits {
                max_posts_per_month: None,
                max_ai_generations_per_month: None,
                max_images_per_post: Some(10),
                max_brands: None,
                max_social_accounts: None,
            },
        }
    }
}

/// Numeric caps for one plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_posts_per_month: Option<i64>,
    pub max_ai_generations_per_month: Option<i64>,
    pub max_images_per_post: Option<i64>,
    pub max_brands: Option<i64>,
    pub max_social_accounts: Option<i64>,
}

/// Current-period usage counts for one user.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UsageCounts {
    pub posts_this_month: i64,
    pub ai_generations_this_month: i64,
    pub brands: i64,
    pub social_accounts: i64,
}

/// Derived "can I" flags: true iff usage is below the cap, or the cap is
/// unlimited.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub can_create_post: bool,
    pub can_generate_ai: bool,
    pub can_create_brand: bool,
    pub can_connect_account: bool,
}

impl Capabilities {
    #[must_use]
    pub fn evaluate(limits: &PlanLimits, usage: &UsageCounts) -> Self {
        Self {
            can_create_post: under(usage.posts_this_month, limits.max_posts_per_month),
            can_generate_ai: under(
                usage.ai_generations_this_month,
                limits.max_ai_generations_per_month,
            ),
            can_create_brand: under(usage.brands, limits.max_brands),
            can_connect_account: under(usage.social_accounts, limits.max_social_accounts),
        }
    }
}

fn under(used: i64, limit: Option<i64>) -> bool {
    limit.is_none_or(|cap| used < cap)
}

/// True when `count` images on a single post fits within the plan cap.
#[must_use]
pub fn images_within_limit(count: usize, limits: &PlanLimits) -> bool {
    match limits.max_images_per_post {
        None => true,
        Some(cap) => i64::try_from(count).map_or(false, |c| c <= cap),
    }
}

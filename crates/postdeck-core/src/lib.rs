pub mod app_config;
pub mod config;
pub mod engagement;
pub mod limits;
pub mod plans;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use engagement::{
    daily_trend, per_platform_maxima, post_engagement, EngagementCounters, EngagementSnapshot,
    PlatformEngagement,
};
pub use limits::{images_within_limit, Capabilities, PlanLimits, PlanTier, UsageCounts};
pub use plans::{load_plan_seeds, parse_plan_seeds, PlanSeed, PlanSeedError};

/// Post lifecycle states as stored in `posts.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "scheduled" => Some(PostStatus::Scheduled),
            "published" => Some(PostStatus::Published),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

/// Derives a URL-safe slug from a brand name: lowercase alphanumerics with
/// single-dash separators, trimmed of leading/trailing dashes.
#[must_use]
pub fn slug_from_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_name_normalizes_punctuation_and_case() {
        assert_eq!(slug_from_name("Acme Coffee Co."), "acme-coffee-co");
        assert_eq!(slug_from_name("  --Weird   Name!! "), "weird-name");
        assert_eq!(slug_from_name("already-slugged"), "already-slugged");
    }

    #[test]
    fn post_status_round_trips() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("archived"), None);
    }
}

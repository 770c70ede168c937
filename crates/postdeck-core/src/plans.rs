//! Plan seed definitions loaded from `config/plans.yaml`.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::limits::PlanTier;

#[derive(Debug, Error)]
pub enum PlanSeedError {
    #[error("failed to read plan seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse plan seed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One seedable plan definition. Absent caps mean unlimited.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSeed {
    pub tier: PlanTier,
    pub name: String,
    pub monthly_price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub max_posts_per_month: Option<i64>,
    pub max_ai_generations_per_month: Option<i64>,
    pub max_images_per_post: Option<i64>,
    pub max_brands: Option<i64>,
    pub max_social_accounts: Option<i64>,
}

fn default_currency() -> String {
    "USD".to_owned()
}

/// Parse plan seeds from a YAML document (a top-level `plans:` list).
///
/// # Errors
///
/// Returns [`PlanSeedError::Yaml`] if the document does not match the schema.
pub fn parse_plan_seeds(yaml: &str) -> Result<Vec<PlanSeed>, PlanSeedError> {
    #[derive(Deserialize)]
    struct Document {
        plans: Vec<PlanSeed>,
    }
    let doc: Document = serde_yaml::from_str(yaml)?;
    Ok(doc.plans)
}

/// Read and parse plan seeds from a file path.
///
/// # Errors
///
/// Returns [`PlanSeedError::Io`] if the file cannot be read, or
/// [`PlanSeedError::Yaml`] if it does not parse.
pub fn load_plan_seeds(path: &Path) -> Result<Vec<PlanSeed>, PlanSeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PlanSeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_plan_seeds(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
plans:
  - tier: free
    name: Free
    monthly_price: '0'
    max_posts_per_month: 10
    max_ai_generations_per_month: 5
    max_images_per_post: 1
    max_brands: 1
    max_social_accounts: 2
  - tier: business
    name: Business
    monthly_price: '99.00'
    currency: EUR
    max_images_per_post: 10
";

    #[test]
    fn parses_plans_with_absent_caps_as_unlimited() {
        let plans = parse_plan_seeds(SAMPLE).expect("parse");
        assert_eq!(plans.len(), 2);

        assert_eq!(plans[0].tier, PlanTier::Free);
        assert_eq!(plans[0].currency, "USD", "currency defaults to USD");
        assert_eq!(plans[0].max_posts_per_month, Some(10));

        assert_eq!(plans[1].tier, PlanTier::Business);
        assert_eq!(plans[1].currency, "EUR");
        assert_eq!(plans[1].max_posts_per_month, None);
        assert_eq!(plans[1].max_images_per_post, Some(10));
    }

    #[test]
    fn rejects_documents_without_a_plans_list() {
        assert!(parse_plan_seeds("tiers: []").is_err());
    }
}

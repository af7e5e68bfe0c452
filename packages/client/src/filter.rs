//! Review list filtering for the forum view.

use std::str::FromStr;

use safe_route_database_models::SafetyTier;
use safe_route_server_models::ApiReview;

/// Which safety tiers to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierFilter {
    /// Every tier.
    #[default]
    All,
    /// A single tier.
    Only(SafetyTier),
}

impl TierFilter {
    /// Whether a review in `tier` passes.
    #[must_use]
    pub fn matches(self, tier: SafetyTier) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == tier,
        }
    }
}

impl FromStr for TierFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "all" {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Reviews in `tier` whose route name or content contains `query`,
/// ignoring case. A blank query matches everything.
#[must_use]
pub fn filter_reviews<'a>(
    reviews: &'a [ApiReview],
    tier: TierFilter,
    query: &str,
) -> Vec<&'a ApiReview> {
    let needle = query.trim().to_lowercase();
    reviews
        .iter()
        .filter(|r| tier.matches(r.safety_tier))
        .filter(|r| {
            needle.is_empty()
                || r.route_name.to_lowercase().contains(&needle)
                || r.content.to_lowercase().contains(&needle)
        })
        .collect()
}

//! Engagement aggregation over analytics snapshot rows.
//!
//! Analytics rows are append-only snapshots, not deltas: each row is a
//! cumulative observation of a post's counters on one platform at one point
//! in time. The current value per platform is therefore the MAXIMUM observed
//! across that platform's rows — summing rows would double count repeated
//! snapshots. Post totals sum the per-platform maxima across platforms.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A set of engagement counters, used both for single snapshots and rollups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementCounters {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub impressions: i64,
}

impl EngagementCounters {
    /// Component-wise maximum of two counter sets.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            likes: self.likes.max(other.likes),
            comments: self.comments.max(other.comments),
            shares: self.shares.max(other.shares),
            impressions: self.impressions.max(other.impressions),
        }
    }

    /// Component-wise saturating sum of two counter sets.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            likes: self.likes.saturating_add(other.likes),
            comments: self.comments.saturating_add(other.comments),
            shares: self.shares.saturating_add(other.shares),
            impressions: self.impressions.saturating_add(other.impressions),
        }
    }
}

/// One analytics snapshot row, decoupled from the database row type.
#[derive(Debug, Clone)]
pub struct EngagementSnapshot {
    pub platform: String,
    pub captured_at: DateTime<Utc>,
    pub counters: EngagementCounters,
}

/// The "current" cumulative counters for one platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformEngagement {
    pub platform: String,
    pub counters: EngagementCounters,
}

/// Collapses snapshots into one counter set per platform by taking the
/// maximum of each counter within the platform group. Output is sorted by
/// platform name for stable responses.
#[must_use]
pub fn per_platform_maxima(snapshots: &[EngagementSnapshot]) -> Vec<PlatformEngagement> {
    let mut by_platform: BTreeMap<&str, EngagementCounters> = BTreeMap::new();
    for snap in snapshots {
        let entry = by_platform
            .entry(snap.platform.as_str())
            .or_default();
        *entry = entry.max(snap.counters);
    }
    by_platform
        .into_iter()
        .map(|(platform, counters)| PlatformEngagement {
            platform: platform.to_owned(),
            counters,
        })
        .collect()
}

/// Total engagement for a post: sum of per-platform maxima.
///
/// A post with no snapshots yields all-zero totals rather than being omitted.
#[must_use]
pub fn post_engagement(snapshots: &[EngagementSnapshot]) -> EngagementCounters {
    per_platform_maxima(snapshots)
        .into_iter()
        .fold(EngagementCounters::default(), |acc, p| acc.add(p.counters))
}

/// Buckets snapshots by calendar UTC day, SUMMING counters within each bucket
/// (cross-post, cross-platform). This is the trend-series shape: days with no
/// snapshots are absent from the map.
#[must_use]
pub fn daily_trend(snapshots: &[EngagementSnapshot]) -> BTreeMap<NaiveDate, EngagementCounters> {
    let mut buckets: BTreeMap<NaiveDate, EngagementCounters> = BTreeMap::new();
    for snap in snapshots {
        let day = snap.captured_at.date_naive();
        let entry = buckets.entry(day).or_default();
        *entry = entry.add(snap.counters);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snap(platform: &str, day: u32, likes: i64, comments: i64, shares: i64) -> EngagementSnapshot {
        EngagementSnapshot {
            platform: platform.to_owned(),
            captured_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            counters: EngagementCounters {
                likes,
                comments,
                shares,
                impressions: likes * 10,
            },
        }
    }

    #[test]
    fn post_engagement_takes_max_per_platform_then_sums() {
        // Two cumulative snapshots per platform; the later supersedes the
        // earlier. Summing rows naively would give likes = 10+25+5+8 = 48.
        let snapshots = vec![
            snap("instagram", 1, 10, 2, 1),
            snap("instagram", 2, 25, 4, 3),
            snap("twitter", 1, 5, 1, 0),
            snap("twitter", 2, 8, 1, 2),
        ];
        let totals = post_engagement(&snapshots);
        assert_eq!(totals.likes, 25 + 8);
        assert_eq!(totals.comments, 4 + 1);
        assert_eq!(totals.shares, 3 + 2);
    }

    #[test]
    fn out_of_order_snapshots_do_not_change_the_result() {
        let mut snapshots = vec![
            snap("instagram", 2, 25, 4, 3),
            snap("instagram", 1, 10, 2, 1),
        ];
        let forward = post_engagement(&snapshots);
        snapshots.reverse();
        assert_eq!(post_engagement(&snapshots), forward);
        assert_eq!(forward.likes, 25);
    }

    #[test]
    fn no_snapshots_yields_zero_engagement() {
        let totals = post_engagement(&[]);
        assert_eq!(totals, EngagementCounters::default());
        assert!(per_platform_maxima(&[]).is_empty());
    }

    #[test]
    fn per_platform_maxima_is_sorted_by_platform() {
        let snapshots = vec![
            snap("twitter", 1, 5, 0, 0),
            snap("instagram", 1, 9, 0, 0),
        ];
        let platforms = per_platform_maxima(&snapshots);
        assert_eq!(platforms[0].platform, "instagram");
        assert_eq!(platforms[1].platform, "twitter");
    }

    #[test]
    fn daily_trend_sums_within_a_day_across_platforms() {
        let snapshots = vec![
            snap("instagram", 1, 10, 2, 1),
            snap("twitter", 1, 5, 1, 0),
            snap("instagram", 3, 25, 4, 3),
        ];
        let trend = daily_trend(&snapshots);
        assert_eq!(trend.len(), 2, "day 2 has no snapshots and is absent");

        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(trend[&day1].likes, 15, "trend buckets SUM, not max");
        assert_eq!(trend[&day1].comments, 3);

        let day3 = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(trend[&day3].likes, 25);
    }
}

//! Per-campaign analytics: dense daily series, prize distribution, totals.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::leads::{LeadStatus, lead_status};
use crate::models::{Lead, Spin};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7d")]
    #[default]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl AnalyticsRange {
    /// Number of daily buckets, or None for the campaign's whole lifetime.
    pub fn days(&self) -> Option<i64> {
        match self {
            AnalyticsRange::Week => Some(7),
            AnalyticsRange::Month => Some(30),
            AnalyticsRange::All => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub range: AnalyticsRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub spins: i64,
    pub leads: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrizeSlice {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
    pub total_spins: i64,
    pub total_leads: i64,
    pub redeemed_leads: i64,
    pub pending_leads: i64,
    pub expired_leads: i64,
    /// Leads per spin, as a percentage rounded to one decimal
    pub conversion_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAnalytics {
    pub time_series_data: Vec<DailyPoint>,
    pub prize_distribution: Vec<PrizeSlice>,
    pub total_stats: TotalStats,
}

fn day_of(ts: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// First day of the series.
pub fn range_start(range: AnalyticsRange, campaign_created_at: i64, now: i64) -> Option<NaiveDate> {
    let today = day_of(now)?;
    match range.days() {
        Some(days) => Some(today - Duration::days(days - 1)),
        None => day_of(campaign_created_at).map(|d| d.min(today)),
    }
}

/// One point per day from `start` to today inclusive, zero-filled.
pub fn daily_series(spins: &[Spin], leads: &[Lead], start: NaiveDate, now: i64) -> Vec<DailyPoint> {
    let Some(today) = day_of(now) else {
        return Vec::new();
    };

    let mut buckets: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    let mut day = start;
    while day <= today {
        buckets.insert(day, (0, 0));
        day += Duration::days(1);
    }

    for spin in spins {
        if let Some(bucket) = day_of(spin.created_at).and_then(|d| buckets.get_mut(&d)) {
            bucket.0 += 1;
        }
    }
    for lead in leads {
        if let Some(bucket) = day_of(lead.created_at).and_then(|d| buckets.get_mut(&d)) {
            bucket.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(date, (spins, leads))| DailyPoint {
            date: date.format("%Y-%m-%d").to_string(),
            spins,
            leads,
        })
        .collect()
}

/// Prize counts from leads, most frequent first.
pub fn prize_distribution(leads: &[Lead]) -> Vec<PrizeSlice> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for lead in leads {
        if let Some(prize) = lead.prize_won.as_deref().filter(|p| !p.trim().is_empty()) {
            *counts.entry(prize).or_default() += 1;
        }
    }
    let mut slices: Vec<PrizeSlice> = counts
        .into_iter()
        .map(|(name, value)| PrizeSlice {
            name: name.to_string(),
            value,
        })
        .collect();
    slices.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    slices
}

pub fn total_stats(spins_count: i64, leads: &[Lead], now: i64) -> TotalStats {
    let mut stats = TotalStats {
        total_spins: spins_count,
        total_leads: leads.len() as i64,
        redeemed_leads: 0,
        pending_leads: 0,
        expired_leads: 0,
        conversion_rate: 0.0,
    };
    for lead in leads {
        match lead_status(lead, now) {
            LeadStatus::Redeemed => stats.redeemed_leads += 1,
            LeadStatus::Expired => stats.expired_leads += 1,
            LeadStatus::Pending => stats.pending_leads += 1,
        }
    }
    if spins_count > 0 {
        let rate = stats.total_leads as f64 / spins_count as f64 * 100.0;
        stats.conversion_rate = (rate * 10.0).round() / 10.0;
    }
    stats
}

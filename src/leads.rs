//! Lead redemption tracking: derived status, search, filter and CSV export.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::models::Lead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeadStatus {
    Redeemed,
    Expired,
    Pending,
}

/// Redeemed takes precedence over expired, which takes precedence over pending.
pub fn lead_status(lead: &Lead, now: i64) -> LeadStatus {
    if lead.is_redeemed {
        LeadStatus::Redeemed
    } else if matches!(lead.redemption_expires_at, Some(expires_at) if expires_at < now) {
        LeadStatus::Expired
    } else {
        LeadStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadFilter {
    #[default]
    All,
    /// Not redeemed, including leads whose window has expired
    Pending,
    Redeemed,
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            LeadFilter::All => true,
            LeadFilter::Pending => !lead.is_redeemed,
            LeadFilter::Redeemed => lead.is_redeemed,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub filter: LeadFilter,
}

/// Case-insensitive substring match over the searchable fields. Missing
/// fields never match; an empty term matches everything.
pub fn matches_search(lead: &Lead, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    [
        lead.name.as_deref(),
        Some(lead.email.as_str()),
        lead.phone.as_deref(),
        lead.prize_won.as_deref(),
        lead.reference_number.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&term))
}

/// Apply search then filter, keeping the input order.
pub fn filter_leads<'a>(leads: &'a [Lead], query: &LeadQuery) -> Vec<&'a Lead> {
    let term = query.search.as_deref().unwrap_or("");
    leads
        .iter()
        .filter(|lead| matches_search(lead, term))
        .filter(|lead| query.filter.matches(lead))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: Lead,
    pub status: LeadStatus,
}

impl LeadView {
    pub fn new(lead: &Lead, now: i64) -> Self {
        Self {
            lead: lead.clone(),
            status: lead_status(lead, now),
        }
    }
}

pub const CSV_HEADER: &str =
    "Name,Email,Phone,Prize Won,Reference Number,Status,Created At,Redeemed At,Expires At";

fn format_timestamp(ts: Option<i64>) -> String {
    ts.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render leads as CSV with every cell quoted. Lines end with CRLF.
pub fn leads_to_csv(leads: &[&Lead], now: i64) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + leads.len() * 128);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");

    for lead in leads {
        let status = lead_status(lead, now);
        let cells = [
            lead.name.clone().unwrap_or_default(),
            lead.email.clone(),
            lead.phone.clone().unwrap_or_default(),
            lead.prize_won.clone().unwrap_or_default(),
            lead.reference_number.clone().unwrap_or_default(),
            status.to_string(),
            format_timestamp(Some(lead.created_at)),
            format_timestamp(lead.redeemed_at),
            format_timestamp(lead.redemption_expires_at),
        ];
        let row: Vec<String> = cells.iter().map(|c| csv_cell(c)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// `leads-{slug}-{YYYY-MM-DD}.csv`
pub fn export_filename(slug: &str, now: i64) -> String {
    let date = DateTime::<Utc>::from_timestamp(now, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!("leads-{}-{}.csv", slug, date)
}

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Short code a winner shows when claiming a prize, e.g. `PW-7K3MQ9XA`.
pub fn generate_reference_number() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..8)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("PW-{}", code)
}

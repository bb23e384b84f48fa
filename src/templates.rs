//! Built-in campaign templates shipped with the binary.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::{CampaignTemplate, CampaignType, LeadFormField, WheelSegment};

struct Seed {
    id: &'static str,
    name: &'static str,
    campaign_type: CampaignType,
    segments: &'static [(&'static str, &'static str, &'static str)],
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "builtin-classic-wheel",
        name: "Classic Prize Wheel",
        campaign_type: CampaignType::Spinwheel,
        segments: &[
            ("10% Off", "#FF6B6B", "discount"),
            ("Free Shipping", "#4ECDC4", "shipping"),
            ("Try Again", "#45B7D1", "none"),
            ("Free Gift", "#F7B731", "gift"),
            ("20% Off", "#5F27CD", "discount"),
            ("Try Again", "#00D2D3", "none"),
        ],
    },
    Seed {
        id: "builtin-restaurant-wheel",
        name: "Restaurant Specials",
        campaign_type: CampaignType::Spinwheel,
        segments: &[
            ("Free Drink", "#E17055", "gift"),
            ("Free Dessert", "#FDCB6E", "gift"),
            ("15% Off Bill", "#00B894", "discount"),
            ("Better Luck", "#636E72", "none"),
            ("Buy 1 Get 1", "#0984E3", "discount"),
            ("Free Starter", "#6C5CE7", "gift"),
        ],
    },
    Seed {
        id: "builtin-retail-scratch",
        name: "Retail Scratch Card",
        campaign_type: CampaignType::Scratch,
        segments: &[
            ("KES 500 Voucher", "#D63031", "voucher"),
            ("5% Off", "#E84393", "discount"),
            ("Free Tote Bag", "#00CEC9", "gift"),
            ("No Prize", "#B2BEC3", "none"),
        ],
    },
];

fn default_lead_fields() -> Vec<LeadFormField> {
    vec![
        LeadFormField {
            name: "name".into(),
            label: "Full name".into(),
            field_type: "text".into(),
            required: true,
        },
        LeadFormField {
            name: "email".into(),
            label: "Email".into(),
            field_type: "email".into(),
            required: true,
        },
        LeadFormField {
            name: "phone".into(),
            label: "Phone".into(),
            field_type: "tel".into(),
            required: false,
        },
    ]
}

/// The shipped catalog as template values. Timestamps are zero.
pub fn builtin_templates() -> Vec<CampaignTemplate> {
    SEEDS
        .iter()
        .map(|seed| CampaignTemplate {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            campaign_type: seed.campaign_type,
            wheel_segments: seed
                .segments
                .iter()
                .map(|(label, color, prize_type)| WheelSegment {
                    label: label.to_string(),
                    color: color.to_string(),
                    icon: None,
                    prize_type: Some(prize_type.to_string()),
                    prize_description: None,
                    redemption_instructions: (*prize_type != "none")
                        .then(|| "Show your reference number at the counter".to_string()),
                })
                .collect(),
            wheel_colors: seed.segments.iter().map(|(_, color, _)| color.to_string()).collect(),
            lead_form_fields: default_lead_fields(),
            is_builtin: true,
            created_at: 0,
            updated_at: 0,
        })
        .collect()
}

pub fn find_builtin(id: &str) -> Option<CampaignTemplate> {
    builtin_templates().into_iter().find(|t| t.id == id)
}

/// Mirror the built-in catalog into the database. Existing rows (edited or
/// not) are left alone, so running this twice inserts nothing the second time.
pub fn migrate_builtin_templates(conn: &Connection) -> Result<usize> {
    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;
    for template in builtin_templates() {
        let template = CampaignTemplate {
            created_at: now,
            updated_at: now,
            ..template
        };
        if queries::insert_campaign_template_if_missing(conn, &template)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Templates offered to users: database rows once migrated, otherwise the
/// shipped catalog.
pub fn available_templates(conn: &Connection) -> Result<Vec<CampaignTemplate>> {
    if queries::count_campaign_templates(conn)? > 0 {
        queries::list_campaign_templates(conn)
    } else {
        Ok(builtin_templates())
    }
}

/// Resolve a template id against the database first, then the catalog.
pub fn resolve_template(conn: &Connection, id: &str) -> Result<Option<CampaignTemplate>> {
    match queries::get_campaign_template(conn, id)? {
        Some(template) => Ok(Some(template)),
        None => Ok(find_builtin(id)),
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::validate_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub campaign_id: String,
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub prize_won: Option<String>,
    pub reference_number: Option<String>,
    pub redemption_expires_at: Option<i64>,
    pub is_redeemed: bool,
    pub redeemed_at: Option<i64>,
    /// User id of whoever last marked the lead redeemed.
    pub redeemed_by: Option<String>,
    pub created_at: i64,
}

/// Public lead capture from the play page.
#[derive(Debug, Deserialize)]
pub struct CaptureLead {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// ISO country code used to validate `phone`.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub prize_won: Option<String>,
}

impl CaptureLead {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if let Some(ref phone) = self.phone {
            if !phone.trim().is_empty() {
                let country = self.country.as_deref().unwrap_or("KE");
                if !crate::phone::is_valid_phone(country, phone) {
                    return Err(AppError::BadRequest(format!(
                        "Invalid phone number for country {}",
                        country.to_uppercase()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRedemption {
    pub is_redeemed: bool,
}

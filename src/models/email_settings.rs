use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::crypto::{MasterKey, mask_secret};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MailgunRegion {
    Us,
    Eu,
}

impl MailgunRegion {
    pub fn api_base(&self) -> &'static str {
        match self {
            MailgunRegion::Us => "https://api.mailgun.net/v3",
            MailgunRegion::Eu => "https://api.eu.mailgun.net/v3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailgunSettingsRow {
    pub sandbox: bool,
    pub domain: String,
    pub from_email: Option<String>,
    pub region: MailgunRegion,
    pub encrypted_api_key: Vec<u8>,
    pub is_active: bool,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct MailgunSettings {
    pub sandbox: bool,
    pub domain: String,
    pub from_email: Option<String>,
    pub region: MailgunRegion,
    pub api_key: String,
    pub is_active: bool,
    pub updated_at: i64,
}

pub fn mailgun_secret_context(sandbox: bool) -> String {
    format!("email:mailgun:{}", if sandbox { "sandbox" } else { "live" })
}

impl MailgunSettingsRow {
    pub fn decrypt(&self, master_key: &MasterKey) -> Result<MailgunSettings> {
        let api_key =
            master_key.decrypt_str(&mailgun_secret_context(self.sandbox), &self.encrypted_api_key)?;
        Ok(MailgunSettings {
            sandbox: self.sandbox,
            domain: self.domain.clone(),
            from_email: self.from_email.clone(),
            region: self.region,
            api_key,
            is_active: self.is_active,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MailgunSettingsMasked {
    pub sandbox: bool,
    pub configured: bool,
    pub domain: Option<String>,
    pub from_email: Option<String>,
    pub region: MailgunRegion,
    pub api_key: Option<String>,
    pub is_active: bool,
}

impl From<&MailgunSettings> for MailgunSettingsMasked {
    fn from(settings: &MailgunSettings) -> Self {
        Self {
            sandbox: settings.sandbox,
            configured: true,
            domain: Some(settings.domain.clone()),
            from_email: settings.from_email.clone(),
            region: settings.region,
            api_key: Some(mask_secret(&settings.api_key)),
            is_active: settings.is_active,
        }
    }
}

impl MailgunSettingsMasked {
    pub fn unconfigured(sandbox: bool) -> Self {
        Self {
            sandbox,
            configured: false,
            domain: None,
            from_email: None,
            region: MailgunRegion::Us,
            api_key: None,
            is_active: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMailgunSettings {
    pub domain: String,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default = "default_region")]
    pub region: MailgunRegion,
    /// Omit to keep the stored key
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

fn default_region() -> MailgunRegion {
    MailgunRegion::Us
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: String,
    pub slug: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct SendTestEmail {
    pub to: String,
    #[serde(default)]
    pub sandbox: Option<bool>,
}

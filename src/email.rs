//! Transactional email via Mailgun.
//!
//! Credentials live in the database (admin-managed, encrypted), so each send
//! resolves the settings for the configured mode first. Prize emails are
//! best-effort: failures are logged and never surface to the player.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::crypto::MasterKey;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::{Campaign, Lead, MailgunSettings};

pub const PRIZE_WON_TEMPLATE: &str = "prize-won";
pub const TEST_EMAIL_TEMPLATE: &str = "test-email";

/// `(slug, subject, text_body, html_body)` installed by
/// `POST /api/admin/install-email-templates`.
pub const DEFAULT_TEMPLATES: &[(&str, &str, &str, &str)] = &[
    (
        PRIZE_WON_TEMPLATE,
        "You won {{prize}} at {{campaign}}!",
        "Hi {{name}},\n\nCongratulations, you won {{prize}} in {{campaign}}.\n\nYour reference number is {{reference}}. Show it when you claim your prize.\n{{expires}}\n",
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Congratulations {{name}}!</h2>
<p>You won <strong>{{prize}}</strong> in {{campaign}}.</p>
<div style="background: #f5f5f5; padding: 20px; border-radius: 8px; text-align: center;">
<code style="font-size: 24px; font-weight: bold; letter-spacing: 2px; color: #333;">{{reference}}</code>
</div>
<p style="color: #666;">Show this reference number when you claim your prize. {{expires}}</p>
</body>
</html>"#,
    ),
    (
        TEST_EMAIL_TEMPLATE,
        "Prizewheel test email",
        "Your Mailgun integration is working.\n",
        "<p>Your Mailgun integration is working.</p>",
    ),
];

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    Sent,
    /// No active Mailgun settings for the configured mode
    NotConfigured,
    /// Template missing; run the template install first
    NoTemplate,
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    #[allow(dead_code)]
    id: Option<String>,
}

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Replace `{{key}}` placeholders. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Clone)]
pub struct EmailService {
    /// Fallback "from" address when the settings row has none
    default_from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(default_from_email: String) -> Self {
        Self {
            default_from_email,
            http_client: Client::new(),
        }
    }

    fn load_settings(db: &DbPool, master_key: &MasterKey, sandbox: bool) -> Result<Option<MailgunSettings>> {
        let conn = db.get()?;
        let Some(row) = queries::get_mailgun_settings(&conn, sandbox)? else {
            return Ok(None);
        };
        let settings = row.decrypt(master_key)?;
        Ok(settings.is_active.then_some(settings))
    }

    /// Send one message through Mailgun's messages endpoint.
    pub async fn send(
        &self,
        settings: &MailgunSettings,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<EmailSendResult> {
        let from = settings
            .from_email
            .as_deref()
            .unwrap_or(&self.default_from_email);
        let url = format!("{}/{}/messages", settings.region.api_base(), settings.domain);

        let response = self
            .http_client
            .post(&url)
            .basic_auth("api", Some(&settings.api_key))
            .form(&[
                ("from", from),
                ("to", to),
                ("subject", subject),
                ("text", text),
                ("html", html),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Mailgun");
                AppError::Internal(format!("Email service error: {}", e))
            })?;

        if response.status().is_success() {
            let _result: MailgunResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Mailgun response");
                AppError::Internal("Email service response error".into())
            })?;
            tracing::info!(to = %to, domain = %settings.domain, "Email sent via Mailgun");
            Ok(EmailSendResult::Sent)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Mailgun returned error");
            Err(AppError::Internal(format!(
                "Email service error: {} - {}",
                status, body
            )))
        }
    }

    /// Render a stored template and send it.
    pub async fn send_template(
        &self,
        db: &DbPool,
        master_key: &MasterKey,
        sandbox: bool,
        slug: &str,
        to: &str,
        vars: &[(&str, &str)],
    ) -> Result<EmailSendResult> {
        let Some(settings) = Self::load_settings(db, master_key, sandbox)? else {
            tracing::warn!(sandbox, "Mailgun not configured, skipping email");
            return Ok(EmailSendResult::NotConfigured);
        };
        let template = {
            let conn = db.get()?;
            queries::get_email_template(&conn, slug)?
        };
        let Some(template) = template else {
            tracing::warn!(slug = %slug, "Email template not installed, skipping email");
            return Ok(EmailSendResult::NoTemplate);
        };

        let escaped: Vec<(&str, String)> = vars.iter().map(|(k, v)| (*k, html_escape(v))).collect();
        let escaped_refs: Vec<(&str, &str)> = escaped.iter().map(|(k, v)| (*k, v.as_str())).collect();

        self.send(
            &settings,
            to,
            &render(&template.subject, vars),
            &render(&template.text_body, vars),
            &render(&template.html_body, &escaped_refs),
        )
        .await
    }

    /// Fire-and-forget prize notification for a freshly captured lead.
    pub fn spawn_prize_email(
        &self,
        db: DbPool,
        master_key: MasterKey,
        sandbox: bool,
        campaign: &Campaign,
        lead: &Lead,
    ) {
        let Some(prize) = lead.prize_won.clone().filter(|p| !p.trim().is_empty()) else {
            return;
        };
        let service = self.clone();
        let to = lead.email.clone();
        let name = lead.name.clone().unwrap_or_else(|| "there".to_string());
        let reference = lead.reference_number.clone().unwrap_or_default();
        let campaign_name = campaign.name.clone();
        let expires = lead
            .redemption_expires_at
            .map(|ts| format!("Claim it before {}.", format_date(ts)))
            .unwrap_or_default();
        let lead_id = lead.id.clone();

        tokio::spawn(async move {
            let vars = [
                ("name", name.as_str()),
                ("prize", prize.as_str()),
                ("campaign", campaign_name.as_str()),
                ("reference", reference.as_str()),
                ("expires", expires.as_str()),
            ];
            match service
                .send_template(&db, &master_key, sandbox, PRIZE_WON_TEMPLATE, &to, &vars)
                .await
            {
                Ok(result) => tracing::debug!(lead_id = %lead_id, ?result, "Prize email processed"),
                Err(e) => tracing::warn!(lead_id = %lead_id, error = %e, "Prize email failed"),
            }
        });
    }
}

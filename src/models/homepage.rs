use serde::{Deserialize, Deserializer, Serialize};

/// Marketing homepage document edited by admins in the site builder.
/// Every section is optional; an absent section is not rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomepageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<HeroSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturesSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testimonials: Option<TestimonialsSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<FooterSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub nav_links: Vec<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeroSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub cta_text: Option<String>,
    #[serde(default)]
    pub cta_url: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<FeatureItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Testimonial {
    pub name: String,
    pub quote: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestimonialsSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<Testimonial>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FooterSection {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub visible: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Str(String),
    Null(()),
}

/// Accepts `true`, `1`, `"true"`, `"1"` (and their false counterparts).
/// Anything unrecognized, including null, reads as false.
fn flexible_bool<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<bool, D::Error> {
    Ok(match BoolLike::deserialize(de)? {
        BoolLike::Bool(b) => b,
        BoolLike::Int(n) => n == 1,
        BoolLike::Str(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        BoolLike::Null(()) => false,
    })
}

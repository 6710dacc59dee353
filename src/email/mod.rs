//! Branded email rendering and delivery.

mod delivery;
mod render;
mod template;

pub use delivery::{sendgrid_payload, Delivery, DeliveryReceipt, SendGridDelivery};
pub use render::{render_email, EmailContent, EMAIL_TEMPLATE};
pub use template::{escape_html, inline_markdown, render_template, validate_href, TemplateValue, Vars};

#[cfg(test)]
pub(crate) use delivery::RecordingDelivery;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{RenderError, Result};

/// Display name, colors and links for the email chrome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandConfig {
    pub name: String,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

fn default_primary_color() -> String {
    "#1f3a5f".to_string()
}

fn default_accent_color() -> String {
    "#e8a33d".to_string()
}

fn color_regex() -> &'static Regex {
    static COLOR_RE: OnceLock<Regex> = OnceLock::new();
    COLOR_RE.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("color regex must compile")
    })
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: "SMB Decision Briefs".to_string(),
            primary_color: default_primary_color(),
            accent_color: default_accent_color(),
            tagline: None,
            logo_url: None,
            website_url: None,
            linkedin_url: None,
            twitter_url: None,
            contact_email: None,
        }
    }
}

impl BrandConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn colors(mut self, primary: impl Into<String>, accent: impl Into<String>) -> Self {
        self.primary_color = primary.into();
        self.accent_color = accent.into();
        self
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website_url = Some(url.into());
        self
    }

    pub fn linkedin(mut self, url: impl Into<String>) -> Self {
        self.linkedin_url = Some(url.into());
        self
    }

    pub fn twitter(mut self, url: impl Into<String>) -> Self {
        self.twitter_url = Some(url.into());
        self
    }

    pub fn tagline(mut self, tagline: impl Into<String>) -> Self {
        self.tagline = Some(tagline.into());
        self
    }

    /// Load a brand from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Check required fields and color tokens.
    pub fn validate(&self) -> std::result::Result<(), RenderError> {
        if self.name.trim().is_empty() {
            return Err(RenderError::MissingBrandField("name"));
        }
        for (field, value) in [
            ("primary_color", &self.primary_color),
            ("accent_color", &self.accent_color),
        ] {
            if !color_regex().is_match(value.trim()) {
                return Err(RenderError::InvalidColor {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The final email, consumed once by delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub plain_text_fallback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_defaults_from_json() {
        let brand: BrandConfig =
            serde_json::from_str(r#"{"name": "Smith Law", "linkedin_url": "https://linkedin.com/company/smith"}"#)
                .unwrap();
        assert_eq!(brand.primary_color, "#1f3a5f");
        assert_eq!(brand.website_url, None);
        assert!(brand.validate().is_ok());
    }

    #[test]
    fn test_brand_validation() {
        assert_eq!(
            BrandConfig::new("  ").validate(),
            Err(RenderError::MissingBrandField("name"))
        );
        assert_eq!(
            BrandConfig::new("Acme").colors("#12345", "#fff").validate(),
            Err(RenderError::InvalidColor {
                field: "primary_color",
                value: "#12345".to_string()
            })
        );
        assert!(BrandConfig::new("Acme").colors("#ABCDEF", "#fff").validate().is_ok());
    }

    #[test]
    fn test_brand_from_missing_file() {
        let err = BrandConfig::from_json_file("/nonexistent/brand.json").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}

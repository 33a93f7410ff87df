//! # Theme
//!
//! Storefront colors and font, edited from the admin panel. One row
//! (`id = 1`) in `site_theme`.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{activity, error::AppError, state::AppState, supabase::Query};

pub const THEME_TABLE: &str = "site_theme";
const THEME_ROW_ID: i64 = 1;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());
static FONT_FAMILY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 -]{1,60}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub background_color: String,
    pub font_family: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#e85d75".into(),
            secondary_color: "#6b3e26".into(),
            accent_color: "#ffc857".into(),
            background_color: "#fff8f0".into(),
            font_family: "Poppins".into(),
        }
    }
}

/// `#ABC` becomes `#aabbcc`.
pub fn normalize_color(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if !HEX_COLOR.is_match(raw) {
        return Err(AppError::invalid(format!("{raw:?} is not a hex color")));
    }

    let digits = raw[1..].to_lowercase();
    if digits.len() == 3 {
        return Ok(digits.chars().fold(String::from("#"), |mut color, c| {
            color.push(c);
            color.push(c);
            color
        }));
    }

    Ok(format!("#{digits}"))
}

impl Theme {
    pub fn validate(self) -> Result<Self, AppError> {
        let font_family = self.font_family.trim().to_string();
        if !FONT_FAMILY.is_match(&font_family) {
            return Err(AppError::invalid(
                "Font family must be 1 to 60 letters, digits, spaces or dashes",
            ));
        }

        Ok(Self {
            primary_color: normalize_color(&self.primary_color)?,
            secondary_color: normalize_color(&self.secondary_color)?,
            accent_color: normalize_color(&self.accent_color)?,
            background_color: normalize_color(&self.background_color)?,
            font_family,
        })
    }
}

pub async fn get(state: &AppState) -> Result<Theme, AppError> {
    Ok(state
        .supabase
        .select_one(THEME_TABLE, Query::new().select("*").eq("id", THEME_ROW_ID))
        .await?
        .unwrap_or_default())
}

pub async fn update(state: &AppState, actor_id: &str, theme: Theme) -> Result<Theme, AppError> {
    let theme = theme.validate()?;

    let mut row = serde_json::to_value(&theme)?;
    row["id"] = json!(THEME_ROW_ID);

    let saved: Theme = state.supabase.upsert(THEME_TABLE, "id", &row).await?;

    activity::record(state, actor_id, "theme.update", "site_theme", "1", row).await;
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color("#ABC").unwrap(), "#aabbcc");
        assert_eq!(normalize_color(" #E85D75 ").unwrap(), "#e85d75");
        assert!(normalize_color("e85d75").is_err());
        assert!(normalize_color("#e85d7").is_err());
        assert!(normalize_color("#ggg").is_err());
    }

    #[test]
    fn test_theme_validation() {
        let theme = Theme {
            accent_color: "#FC0".into(),
            ..Theme::default()
        }
        .validate()
        .unwrap();
        assert_eq!(theme.accent_color, "#ffcc00");

        let bad_font = Theme {
            font_family: "Comic Sans; drop".into(),
            ..Theme::default()
        };
        assert!(bad_font.validate().is_err());
    }

    #[test]
    fn test_default_theme_is_valid() {
        assert_eq!(Theme::default().validate().unwrap(), Theme::default());
    }
}

//! # Accounts
//!
//! Profiles mirror auth users one to one (`profiles.id` is the auth user id).
//! A profile is created lazily the first time a signed-in user asks for it and
//! counts as onboarded once name, phone and address are filled in, which is
//! everything checkout needs to hand the order to WhatsApp.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{auth::AuthUser, error::AppError, state::AppState, supabase::Query, utils::bounded_text};

pub const PROFILES_TABLE: &str = "profiles";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub onboarded: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Indonesian phone number in international form without the plus sign,
/// e.g. `0812-3456-7890` becomes `6281234567890`.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect();
    let compact = compact.strip_prefix('+').unwrap_or(&compact);

    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid("Phone number may only contain digits"));
    }

    let international = match compact.strip_prefix('0') {
        Some(rest) => format!("62{rest}"),
        None => compact.to_string(),
    };

    if !international.starts_with("62") || !(9..=15).contains(&international.len()) {
        return Err(AppError::invalid("Phone number must be a valid Indonesian number"));
    }

    Ok(international)
}

pub fn validate_name(raw: &str) -> Result<String, AppError> {
    bounded_text(raw, 2, 80).ok_or_else(|| AppError::invalid("Name must be 2 to 80 characters"))
}

pub fn validate_address(raw: &str) -> Result<String, AppError> {
    bounded_text(raw, 10, 300).ok_or_else(|| AppError::invalid("Address must be 10 to 300 characters"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingRequest {
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

impl OnboardingRequest {
    pub fn validate(&self) -> Result<ContactDetails, AppError> {
        Ok(ContactDetails {
            full_name: validate_name(&self.full_name)?,
            phone: normalize_phone(&self.phone)?,
            address: validate_address(&self.address)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<serde_json::Value, AppError> {
        let mut patch = serde_json::Map::new();

        if let Some(name) = &self.full_name {
            patch.insert("full_name".into(), json!(validate_name(name)?));
        }
        if let Some(phone) = &self.phone {
            patch.insert("phone".into(), json!(normalize_phone(phone)?));
        }
        if let Some(address) = &self.address {
            patch.insert("address".into(), json!(validate_address(address)?));
        }

        if patch.is_empty() {
            return Err(AppError::MalformedPayload);
        }

        Ok(serde_json::Value::Object(patch))
    }
}

pub async fn find_profile(state: &AppState, user_id: &str) -> Result<Option<Profile>, AppError> {
    state
        .supabase
        .select_one(PROFILES_TABLE, Query::new().select("*").eq("id", user_id))
        .await
}

pub async fn get_or_create_profile(state: &AppState, user: &AuthUser) -> Result<Profile, AppError> {
    if let Some(profile) = find_profile(state, &user.id).await? {
        return Ok(profile);
    }

    info!("Creating profile for {}", user.id);

    state
        .supabase
        .upsert(
            PROFILES_TABLE,
            "id",
            &json!({ "id": user.id, "email": user.email, "role": Role::Customer }),
        )
        .await
}

pub async fn onboard(
    state: &AppState,
    user: &AuthUser,
    request: OnboardingRequest,
) -> Result<Profile, AppError> {
    let details = request.validate()?;

    state
        .supabase
        .upsert(
            PROFILES_TABLE,
            "id",
            &json!({
                "id": user.id,
                "email": user.email,
                "full_name": details.full_name,
                "phone": details.phone,
                "address": details.address,
                "onboarded": true,
            }),
        )
        .await
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    update: ProfileUpdate,
) -> Result<Profile, AppError> {
    let patch = update.validate()?;

    let mut rows: Vec<Profile> = state
        .supabase
        .update(PROFILES_TABLE, &Query::new().eq("id", &user.id), &patch)
        .await?;

    rows.pop().ok_or(AppError::NotFound("Profile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_local_number() {
        assert_eq!(normalize_phone("0812-3456-7890").unwrap(), "6281234567890");
        assert_eq!(normalize_phone(" 0812 3456 789 ").unwrap(), "628123456789");
    }

    #[test]
    fn test_normalize_international_number() {
        assert_eq!(normalize_phone("+62 812 3456 7890").unwrap(), "6281234567890");
        assert_eq!(normalize_phone("6281234567890").unwrap(), "6281234567890");
    }

    #[test]
    fn test_reject_foreign_and_garbage() {
        assert!(normalize_phone("+1 415 555 0100").is_err());
        assert!(normalize_phone("0812abc").is_err());
        assert!(normalize_phone("0812").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn test_onboarding_validation() {
        let request = OnboardingRequest {
            full_name: "  Sari Dewi ".into(),
            phone: "081234567890".into(),
            address: "Jl. Melati No. 7, Bandung".into(),
        };

        let details = request.validate().unwrap();
        assert_eq!(details.full_name, "Sari Dewi");
        assert_eq!(details.phone, "6281234567890");

        let short_address = OnboardingRequest {
            address: "Bandung".into(),
            ..request
        };
        assert!(short_address.validate().is_err());
    }

    #[test]
    fn test_profile_update_patch() {
        let update = ProfileUpdate {
            phone: Some("0811 111 1111".into()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap(), json!({ "phone": "628111111111" }));

        assert!(ProfileUpdate::default().validate().is_err());
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));

        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "email": null,
            "full_name": null,
            "phone": null,
            "address": null,
            "created_at": null
        }))
        .unwrap();
        assert_eq!(profile.role, Role::Customer);
        assert_eq!(profile.points, 0);
        assert!(!profile.onboarded);
    }
}

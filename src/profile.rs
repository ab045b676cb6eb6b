//! Hotel profile loading and validation.
//!
//! A profile is the hotel-specific tone, policy and phrasing guidance that
//! grounds every grading request. It is parsed once per session from YAML
//! and validated up front, so type errors never surface at grading time.
//!
//! Two layouts are accepted:
//!
//! ```yaml
//! name: The Statler Hotel
//! tone_guidelines: [warm, concise]
//! key_policies: [No complimentary upgrades without manager approval]
//! example_phrases: ["I completely understand how frustrating that is."]
//! ```
//!
//! or several hotels keyed by identity under `hotels:`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoachError;

/// Immutable tone and policy guidance for one hotel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotelProfile {
    name: String,
    tone_guidelines: Vec<String>,
    key_policies: Vec<String>,
    example_phrases: Vec<String>,
}

/// Profile exactly as written in YAML, before validation.
#[derive(Debug, Deserialize)]
struct RawProfile {
    name: String,
    tone_guidelines: Vec<String>,
    key_policies: Vec<String>,
    #[serde(default)]
    example_phrases: Vec<String>,
}

impl HotelProfile {
    /// Build a validated profile.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when the name is blank, when tone
    /// guidelines or key policies are empty, or when any entry is blank.
    pub fn new(
        name: impl Into<String>,
        tone_guidelines: Vec<String>,
        key_policies: Vec<String>,
        example_phrases: Vec<String>,
    ) -> Result<Self, CoachError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(CoachError::config("profile field `name` is empty"));
        }
        Ok(Self {
            name,
            tone_guidelines: clean_list("tone_guidelines", tone_guidelines, true)?,
            key_policies: clean_list("key_policies", key_policies, true)?,
            example_phrases: clean_list("example_phrases", example_phrases, false)?,
        })
    }

    /// Parse a profile from YAML text.
    ///
    /// `hotel_id` selects an entry when the document uses the `hotels:` layout.
    /// A flat document accepts no `hotel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] on invalid YAML, missing or mistyped
    /// required fields, or an unknown/ambiguous hotel identity.
    pub fn from_yaml_str(text: &str, hotel_id: Option<&str>) -> Result<Self, CoachError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| CoachError::config(format!("profile is not valid YAML: {e}")))?;
        let node = select_hotel(doc, hotel_id)?;
        let raw: RawProfile = serde_yaml::from_value(node)
            .map_err(|e| CoachError::config(format!("invalid hotel profile: {e}")))?;
        Self::new(
            raw.name,
            raw.tone_guidelines,
            raw.key_policies,
            raw.example_phrases,
        )
    }

    /// Hotel display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tone guidelines, in configured order.
    pub fn tone_guidelines(&self) -> &[String] {
        &self.tone_guidelines
    }

    /// Key policies, in configured order.
    pub fn key_policies(&self) -> &[String] {
        &self.key_policies
    }

    /// Example phrases, in configured order. May be empty.
    pub fn example_phrases(&self) -> &[String] {
        &self.example_phrases
    }
}

/// Load a hotel profile from a YAML file.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if the file cannot be read or fails validation.
pub fn load_profile(path: &Path, hotel_id: Option<&str>) -> Result<HotelProfile, CoachError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CoachError::config(format!("failed to read profile at {}: {e}", path.display()))
    })?;
    let profile = HotelProfile::from_yaml_str(&text, hotel_id)
        .map_err(|e| CoachError::config(format!("{}: {e}", path.display())))?;
    debug!(
        path = %path.display(),
        hotel = %profile.name(),
        policies = profile.key_policies().len(),
        "hotel profile loaded"
    );
    Ok(profile)
}

fn select_hotel(
    doc: serde_yaml::Value,
    hotel_id: Option<&str>,
) -> Result<serde_yaml::Value, CoachError> {
    if doc.get("hotels").is_none() {
        return match hotel_id {
            Some(id) => Err(CoachError::config(format!(
                "hotel `{id}` requested but the profile has no `hotels` mapping"
            ))),
            None => Ok(doc),
        };
    }
    let hotels = &doc["hotels"];
    let mapping = hotels
        .as_mapping()
        .ok_or_else(|| CoachError::config("`hotels` must be a mapping of hotel id to profile"))?;

    if let Some(id) = hotel_id {
        return hotels
            .get(id)
            .cloned()
            .ok_or_else(|| CoachError::config(format!("hotel `{id}` not found in profile")));
    }

    let mut entries = mapping.iter();
    match (entries.next(), entries.next()) {
        (Some((_, only)), None) => Ok(only.clone()),
        (None, _) => Err(CoachError::config("`hotels` mapping is empty")),
        _ => {
            let ids: Vec<&str> = mapping.keys().filter_map(serde_yaml::Value::as_str).collect();
            Err(CoachError::config(format!(
                "profile defines several hotels ({}); choose one",
                ids.join(", ")
            )))
        }
    }
}

fn clean_list(
    field: &str,
    items: Vec<String>,
    required: bool,
) -> Result<Vec<String>, CoachError> {
    if required && items.is_empty() {
        return Err(CoachError::config(format!(
            "profile field `{field}` must list at least one entry"
        )));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                Err(CoachError::config(format!(
                    "profile field `{field}` has a blank entry at position {index}"
                )))
            } else {
                Ok(trimmed.to_owned())
            }
        })
        .collect()
}

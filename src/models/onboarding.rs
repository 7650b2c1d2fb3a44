// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding/profile form as submitted by the presentation layer.

use crate::models::profile::DEFAULT_AGE;
use crate::models::{ActivityLevel, Profile, WeightUnit};
use crate::services::targets::{parse_int_prefix, to_storage_weight};
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Raw form values. Weights are in the selected display unit and numbers
/// arrive as typed text.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub current_weight: String,
    #[serde(default)]
    pub goal_weight: String,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default = "default_activity")]
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub unit: WeightUnit,
    #[serde(default = "default_true")]
    pub auto_calc_calories: bool,
    #[serde(default)]
    pub target_calories: String,
}

/// The trimmed name is what gets saved, so that is what must be non-empty.
fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if (1..=100).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("length").with_message("Name must be 1 to 100 characters".into()))
    }
}

fn default_activity() -> ActivityLevel {
    ActivityLevel::Moderate
}

fn default_true() -> bool {
    true
}

impl OnboardingForm {
    /// Build the complete profile to save. Completing the form always marks
    /// onboarding as done.
    pub fn into_profile(self) -> Profile {
        // Zero, negative or unreadable ages fall back to the default
        let age = parse_int_prefix(&self.age)
            .and_then(|a| u32::try_from(a).ok())
            .filter(|a| *a > 0)
            .unwrap_or(DEFAULT_AGE);

        let target_calories = if self.auto_calc_calories {
            None
        } else {
            Some(parse_int_prefix(&self.target_calories).unwrap_or(0))
        };

        Profile {
            name: Some(self.name.trim().to_string()),
            age: Some(age),
            current_weight: Some(to_storage_weight(&self.current_weight, self.unit)),
            goal_weight: Some(to_storage_weight(&self.goal_weight, self.unit)),
            height_cm: self.height_cm.filter(|h| *h > 0.0),
            activity_level: Some(self.activity_level),
            unit: Some(self.unit),
            auto_calc_calories: Some(self.auto_calc_calories),
            target_calories,
            onboarding_completed: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> OnboardingForm {
        serde_json::from_value(serde_json::json!({
            "name": " Ana ",
            "age": "",
            "currentWeight": "176.4",
            "goalWeight": "165",
            "unit": "lbs",
        }))
        .unwrap()
    }

    #[test]
    fn test_form_defaults() {
        let profile = form().into_profile();
        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.age, Some(DEFAULT_AGE));
        assert_eq!(profile.activity_level, Some(ActivityLevel::Moderate));
        assert_eq!(profile.auto_calc_calories, Some(true));
        assert_eq!(profile.target_calories, None);
        assert_eq!(profile.onboarding_completed, Some(true));
    }

    #[test]
    fn test_form_weights_are_stored_in_kg() {
        let profile = form().into_profile();
        let current = profile.current_weight.unwrap();
        assert!((current - 80.01).abs() < 0.01, "{}", current);
        assert_eq!(profile.unit, Some(WeightUnit::Lbs));
    }

    #[test]
    fn test_manual_target_parsed_or_zero() {
        let mut f = form();
        f.auto_calc_calories = false;
        f.target_calories = "1850".to_string();
        assert_eq!(f.clone().into_profile().target_calories, Some(1850));

        f.target_calories = "lots".to_string();
        assert_eq!(f.into_profile().target_calories, Some(0));
    }

    #[test]
    fn test_empty_name_fails_validation() {
        let mut f = form();
        f.name = String::new();
        assert!(f.validate().is_err());

        f.name = "   ".to_string();
        assert!(f.validate().is_err());

        f.name = " Ana ".to_string();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_age_keeps_any_positive_value() {
        let mut f = form();
        f.age = "200".to_string();
        assert_eq!(f.clone().into_profile().age, Some(200));

        f.age = "41.9".to_string();
        assert_eq!(f.clone().into_profile().age, Some(41));

        for fallback in ["0", "-5", "old"] {
            f.age = fallback.to_string();
            assert_eq!(f.clone().into_profile().age, Some(DEFAULT_AGE), "{fallback}");
        }
    }
}

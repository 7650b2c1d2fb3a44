// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nutrition/weight profile model for storage and API.

use super::log_entry::lenient_number;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Default age used when the profile does not carry one.
pub const DEFAULT_AGE: u32 = 30;

/// Activity level used to scale the energy expenditure estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
    /// Anything written by an older or foreign client.
    #[serde(other)]
    Unknown,
}

/// Display unit for weights. Storage is always kilograms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lbs,
}

impl WeightUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lbs => "lbs",
        }
    }
}

/// User profile stored at `users/{uid}/data/profile` (remote) or under the
/// `smartfit_profile` key (local).
///
/// Every field is optional so a partial profile round-trips unchanged:
/// remote saves merge field by field, local saves replace the whole object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whole years. Stored values that are negative or not numbers read as unset.
    #[serde(
        default,
        deserialize_with = "lenient_age",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<u32>,
    /// Current weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,
    /// Goal weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_weight: Option<f64>,
    /// Height in centimetres; the energy estimate assumes 170 cm without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<WeightUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_calc_calories: Option<bool>,
    /// Manual daily calorie target, only used when auto-calc is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_calories: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
}

impl Profile {
    /// Display unit, `kg` when unset.
    pub fn unit(&self) -> WeightUnit {
        self.unit.unwrap_or_default()
    }

    /// Whether the profile still needs the onboarding form.
    ///
    /// A profile without a name has never been through onboarding.
    pub fn needs_onboarding(profile: Option<&Profile>) -> bool {
        match profile {
            None => true,
            Some(p) => p.name.as_deref().map_or(true, str::is_empty),
        }
    }

    /// Shallow merge: fields set in `patch` win, everything else is kept.
    /// Switching auto-calc on drops a manual target the patch does not set.
    pub fn merged_with(&self, patch: &Profile) -> Profile {
        Profile {
            name: patch.name.clone().or_else(|| self.name.clone()),
            age: patch.age.or(self.age),
            current_weight: patch.current_weight.or(self.current_weight),
            goal_weight: patch.goal_weight.or(self.goal_weight),
            height_cm: patch.height_cm.or(self.height_cm),
            activity_level: patch.activity_level.or(self.activity_level),
            unit: patch.unit.or(self.unit),
            auto_calc_calories: patch.auto_calc_calories.or(self.auto_calc_calories),
            target_calories: if patch.auto_calc_calories == Some(true) {
                patch.target_calories
            } else {
                patch.target_calories.or(self.target_calories)
            },
            onboarding_completed: patch.onboarding_completed.or(self.onboarding_completed),
        }
    }

    /// Fields for a remote merge write. Unset fields are left alone except
    /// the manual target, which is written as null when auto-calc is
    /// switched on without one.
    pub fn to_merge_document(&self) -> serde_json::Result<Value> {
        let mut doc = serde_json::to_value(self)?;
        if self.auto_calc_calories == Some(true) && self.target_calories.is_none() {
            if let Value::Object(fields) = &mut doc {
                fields.insert("targetCalories".to_string(), Value::Null);
            }
        }
        Ok(doc)
    }
}

fn lenient_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .map(f64::trunc)
        .filter(|n| (0.0..=u32::MAX as f64).contains(n))
        .map(|n| n as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_profile_serializes_only_set_fields() {
        let profile = Profile {
            name: Some("X".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json, serde_json::json!({"name": "X"}));
    }

    #[test]
    fn test_unknown_activity_level_deserializes() {
        let profile: Profile =
            serde_json::from_str(r#"{"activityLevel": "extreme", "unit": "lbs"}"#).unwrap();
        assert_eq!(profile.activity_level, Some(ActivityLevel::Unknown));
        assert_eq!(profile.unit(), WeightUnit::Lbs);
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let base = Profile {
            name: Some("Ana".to_string()),
            age: Some(41),
            current_weight: Some(80.0),
            ..Default::default()
        };
        let patch = Profile {
            current_weight: Some(78.5),
            ..Default::default()
        };
        let merged = base.merged_with(&patch);
        assert_eq!(merged.name.as_deref(), Some("Ana"));
        assert_eq!(merged.age, Some(41));
        assert_eq!(merged.current_weight, Some(78.5));
    }

    #[test]
    fn test_enabling_auto_calc_clears_manual_target() {
        let base = Profile {
            auto_calc_calories: Some(false),
            target_calories: Some(1800),
            ..Default::default()
        };
        let patch = Profile {
            auto_calc_calories: Some(true),
            ..Default::default()
        };
        let merged = base.merged_with(&patch);
        assert_eq!(merged.target_calories, None);

        let doc = patch.to_merge_document().unwrap();
        assert_eq!(
            doc,
            serde_json::json!({"autoCalcCalories": true, "targetCalories": null})
        );

        // Other partial updates keep the manual target
        let rename = Profile {
            name: Some("Ana".to_string()),
            ..Default::default()
        };
        assert_eq!(base.merged_with(&rename).target_calories, Some(1800));
        assert_eq!(
            rename.to_merge_document().unwrap(),
            serde_json::json!({"name": "Ana"})
        );
    }

    #[test]
    fn test_stored_age_is_read_leniently() {
        let profile: Profile = serde_json::from_str(r#"{"name": "Ana", "age": -5}"#).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.age, None);

        let profile: Profile = serde_json::from_str(r#"{"age": "41"}"#).unwrap();
        assert_eq!(profile.age, Some(41));

        let profile: Profile = serde_json::from_str(r#"{"age": 29.9}"#).unwrap();
        assert_eq!(profile.age, Some(29));

        let profile: Profile = serde_json::from_str(r#"{"age": null}"#).unwrap();
        assert_eq!(profile.age, None);
    }

    #[test]
    fn test_needs_onboarding() {
        assert!(Profile::needs_onboarding(None));
        assert!(Profile::needs_onboarding(Some(&Profile::default())));
        let named = Profile {
            name: Some("Ana".to_string()),
            ..Default::default()
        };
        assert!(!Profile::needs_onboarding(Some(&named)));
    }
}

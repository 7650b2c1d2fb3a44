// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily calorie/macro targets and weight unit conversion.
//!
//! Everything here is pure and total: missing or invalid profile fields fall
//! back to defaults instead of failing.

use crate::models::{ActivityLevel, Profile, WeightUnit};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Kilograms to pounds.
pub const KG_TO_LBS: f64 = 2.20462;

/// Calories used when there is no usable body weight.
pub const FALLBACK_CALORIES: i64 = 2000;
/// Lower bound for computed targets.
pub const MIN_CALORIES: i64 = 1200;
/// Height assumed by the energy estimate when the profile has none.
pub const DEFAULT_HEIGHT_CM: f64 = 170.0;

const LOSS_DEFICIT: f64 = 500.0;
const GAIN_SURPLUS: f64 = 300.0;

const PROTEIN_SHARE: f64 = 0.30;
const FATS_SHARE: f64 = 0.35;
const CARBS_SHARE: f64 = 0.35;
const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;
const KCAL_PER_G_CARBS: f64 = 4.0;

/// Daily targets derived from a profile. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Targets {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

impl Targets {
    /// Split a calorie budget into grams using the fixed 30/35/35 ratio.
    pub fn from_calories(calories: i64) -> Self {
        let kcal = calories as f64;
        Self {
            calories,
            protein: (kcal * PROTEIN_SHARE / KCAL_PER_G_PROTEIN).round() as i64,
            fats: (kcal * FATS_SHARE / KCAL_PER_G_FAT).round() as i64,
            carbs: (kcal * CARBS_SHARE / KCAL_PER_G_CARBS).round() as i64,
        }
    }
}

fn activity_multiplier(level: Option<ActivityLevel>) -> f64 {
    match level {
        Some(ActivityLevel::Moderate) => 1.55,
        Some(ActivityLevel::High) => 1.9,
        _ => 1.2,
    }
}

/// Estimated daily energy need, before any manual override.
///
/// Mifflin-St Jeor (male constant) times an activity multiplier, shifted by
/// the goal direction and floored at [`MIN_CALORIES`].
pub fn estimated_calories(profile: Option<&Profile>) -> i64 {
    let Some(profile) = profile else {
        return FALLBACK_CALORIES;
    };
    let weight = match profile.current_weight {
        Some(w) if w > 0.0 => w,
        _ => return FALLBACK_CALORIES,
    };

    let age = match profile.age {
        Some(a) if a > 0 => f64::from(a),
        _ => f64::from(crate::models::profile::DEFAULT_AGE),
    };
    let height = profile
        .height_cm
        .filter(|h| *h > 0.0)
        .unwrap_or(DEFAULT_HEIGHT_CM);

    let mut tdee = (10.0 * weight + 6.25 * height - 5.0 * age + 5.0)
        * activity_multiplier(profile.activity_level);

    let goal = profile
        .goal_weight
        .filter(|g| *g != 0.0 && g.is_finite())
        .unwrap_or(weight);
    if goal < weight {
        tdee -= LOSS_DEFICIT;
    } else if goal > weight {
        tdee += GAIN_SURPLUS;
    }

    (tdee.round() as i64).max(MIN_CALORIES)
}

/// Daily calorie and macro targets for a profile.
///
/// A positive manual target wins only when auto-calculation is explicitly
/// switched off.
pub fn calculate_targets(profile: Option<&Profile>) -> Targets {
    let manual = profile.and_then(|p| match (p.auto_calc_calories, p.target_calories) {
        (Some(false), Some(target)) if target > 0 => Some(target),
        _ => None,
    });

    let calories = manual.unwrap_or_else(|| estimated_calories(profile));
    Targets::from_calories(calories)
}

/// Format a stored (kg) weight in the display unit with one decimal.
///
/// Missing, zero or NaN weights display as `"0"`.
pub fn to_display_weight(kg: Option<f64>, unit: WeightUnit) -> String {
    match kg {
        Some(kg) if kg != 0.0 && !kg.is_nan() => match unit {
            WeightUnit::Kg => format!("{:.1}", kg),
            WeightUnit::Lbs => format!("{:.1}", kg * KG_TO_LBS),
        },
        _ => "0".to_string(),
    }
}

/// Parse a user-entered weight in the display unit into kilograms.
///
/// Empty or unparsable input yields `0.0`. No rounding is applied.
pub fn to_storage_weight(value: &str, unit: WeightUnit) -> f64 {
    let Some(parsed) = parse_float_prefix(value) else {
        return 0.0;
    };
    if parsed == 0.0 {
        return 0.0;
    }
    match unit {
        WeightUnit::Kg => parsed,
        WeightUnit::Lbs => parsed / KG_TO_LBS,
    }
}

/// Convert a display-unit value typed into a form when the unit toggles.
///
/// Rounded to one decimal like the form shows it.
pub fn convert_display_weight(value: &str, from: WeightUnit, to: WeightUnit) -> String {
    if from == to {
        return value.to_string();
    }
    let parsed = parse_float_prefix(value).unwrap_or(0.0);
    let factor = match to {
        WeightUnit::Lbs => KG_TO_LBS,
        WeightUnit::Kg => 1.0 / KG_TO_LBS,
    };
    format!("{:.1}", parsed * factor)
}

/// Lenient float parsing: leading whitespace is skipped and the longest
/// numeric prefix is used ("72.5 kg" parses as 72.5, "8e1" as 80).
pub(crate) fn parse_float_prefix(value: &str) -> Option<f64> {
    let trimmed = value.trim_start();
    let bytes = trimmed.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    // An exponent only counts with digits after it ("8e" parses as 8)
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    trimmed[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leading integer of a typed value ("1850 kcal" is 1850, "41.9" is 41).
pub(crate) fn parse_int_prefix(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let bytes = trimmed.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    trimmed[..sign + digits].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

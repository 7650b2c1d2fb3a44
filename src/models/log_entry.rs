// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Food/weight/workout log entries.

use crate::services::targets::parse_float_prefix;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A single log record.
///
/// Stored at `users/{uid}/logs/{id}` (remote, where the id is the document
/// name and is not part of the stored fields) or as an element of the
/// `smartfit_logs` array (local).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: LogDate,
    #[serde(flatten)]
    pub kind: LogKind,
}

/// Type-specific payload, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogKind {
    Food {
        #[serde(default)]
        description: String,
        /// Absent in entries written before meals were tracked
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meal: Option<Meal>,
        #[serde(default)]
        nutrition: Nutrition,
    },
    Weight {
        /// Kilograms. Edited entries may hold the typed text instead of a
        /// number.
        #[serde(default, deserialize_with = "lenient_float")]
        value: f64,
    },
    Workout {
        #[serde(default)]
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

/// Nutrition facts for a food entry. Fractional values are rounded on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Nutrition {
    #[serde(default, deserialize_with = "rounded")]
    pub calories: i64,
    #[serde(default, deserialize_with = "rounded")]
    pub protein: i64,
    #[serde(default, deserialize_with = "rounded")]
    pub carbs: i64,
    #[serde(default, deserialize_with = "rounded")]
    pub fats: i64,
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, rhs: Nutrition) -> Nutrition {
        Nutrition {
            calories: self.calories.saturating_add(rhs.calories),
            protein: self.protein.saturating_add(rhs.protein),
            carbs: self.carbs.saturating_add(rhs.carbs),
            fats: self.fats.saturating_add(rhs.fats),
        }
    }
}

/// Any JSON number, or a string with a numeric prefix ("72.5 kg").
/// Null and unparsable values are `None`.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Some(n).filter(|n| n.is_finite()),
        Raw::Text(s) => parse_float_prefix(&s),
        Raw::Other(_) => None,
    })
}

/// [`lenient_number`], defaulting to zero.
pub(crate) fn lenient_float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.unwrap_or(0.0))
}

/// [`lenient_number`] rounded to an integer. Out-of-range values saturate.
pub(crate) fn rounded<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.map_or(0, |n| n.round() as i64))
}

/// Entry date as written by either backend: an ISO-8601 string, or a
/// store-native `{seconds, nanoseconds}` timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(untagged)]
pub enum LogDate {
    Timestamp {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
    Iso(String),
}

impl LogDate {
    pub fn now() -> Self {
        LogDate::from(Utc::now())
    }

    /// Normalise to a UTC instant, or `None` if the value cannot be read.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            LogDate::Timestamp {
                seconds,
                nanoseconds,
            } => DateTime::from_timestamp(*seconds, *nanoseconds),
            LogDate::Iso(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // Bare dates ("2025-03-01") as typed into a date picker
                    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| dt.and_utc())
                }),
        }
    }

    /// Normalised instant; unreadable dates count as "now".
    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.parse().unwrap_or_else(Utc::now)
    }
}

impl From<DateTime<Utc>> for LogDate {
    fn from(date: DateTime<Utc>) -> Self {
        LogDate::Iso(date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }
}

impl LogEntry {
    pub fn new(kind: LogKind) -> Self {
        Self {
            id: None,
            date: LogDate::now(),
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            LogKind::Food { .. } => "food",
            LogKind::Weight { .. } => "weight",
            LogKind::Workout { .. } => "workout",
        }
    }

    /// Weight in kilograms if this is a weight entry.
    pub fn weight_kg(&self) -> Option<f64> {
        match self.kind {
            LogKind::Weight { value } => Some(value),
            _ => None,
        }
    }

    pub fn nutrition(&self) -> Option<&Nutrition> {
        match &self.kind {
            LogKind::Food { nutrition, .. } => Some(nutrition),
            _ => None,
        }
    }

    /// Non-empty id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_food_entry_shape() {
        let entry: LogEntry = serde_json::from_value(json!({
            "id": "1700000000000",
            "type": "food",
            "description": "Oatmeal",
            "nutrition": {"calories": 150.4, "protein": 5, "carbs": 27.6, "fats": "3"},
            "date": "2025-03-01T08:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(entry.type_name(), "food");
        assert_eq!(
            entry.nutrition().copied(),
            Some(Nutrition {
                calories: 150,
                protein: 5,
                carbs: 28,
                fats: 3
            })
        );

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["type"], "food");
        assert!(back.get("meal").is_none());
    }

    #[test]
    fn test_weight_entry_with_native_timestamp() {
        let entry: LogEntry = serde_json::from_value(json!({
            "type": "weight",
            "value": 68.0,
            "date": {"seconds": 1_740_816_000, "nanoseconds": 0}
        }))
        .unwrap();

        assert_eq!(entry.weight_kg(), Some(68.0));
        assert_eq!(
            entry.date.parse().unwrap().to_rfc3339(),
            "2025-03-01T08:00:00+00:00"
        );
    }

    #[test]
    fn test_edited_weight_keeps_typed_text_value() {
        let entry: LogEntry = serde_json::from_value(json!({
            "id": "1700000000000",
            "type": "weight",
            "value": "68.5",
            "date": "2025-03-01T08:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(entry.weight_kg(), Some(68.5));

        let blank: LogEntry =
            serde_json::from_value(json!({"type": "weight", "value": null, "date": "2025-03-01"}))
                .unwrap();
        assert_eq!(blank.weight_kg(), Some(0.0));
    }

    #[test]
    fn test_nutrition_totals_saturate() {
        let huge: Nutrition = serde_json::from_value(json!({"calories": 1e19, "fats": -1e19})).unwrap();
        assert_eq!(huge.calories, i64::MAX);

        let total = huge + huge;
        assert_eq!(total.calories, i64::MAX);
        assert_eq!(total.fats, i64::MIN);
    }

    #[test]
    fn test_unreadable_date_is_none() {
        assert!(LogDate::Iso("not a date".to_string()).parse().is_none());
        assert!(LogDate::Iso("2025-03-01".to_string()).parse().is_some());
    }

    #[test]
    fn test_empty_id_is_treated_as_missing() {
        let mut entry = LogEntry::new(LogKind::Workout {
            value: "5k run".to_string(),
        });
        entry.id = Some(String::new());
        assert_eq!(entry.id(), None);
    }
}

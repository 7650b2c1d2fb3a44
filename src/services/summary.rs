// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-side aggregation over log entries.
//!
//! Nothing here is stored; every figure is recomputed from the current logs.
//! Days are compared through a `YYYY-MM-DD` key in the viewer's time zone,
//! never by timestamp equality.

use crate::models::{LogDate, LogEntry, Nutrition, WeightUnit};
use crate::services::targets::to_display_weight;
use chrono::{DateTime, Days, Local, TimeZone, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Number of days in the rolling series.
pub const WEEK_DAYS: i64 = 7;

/// Most recent weight entries shown in the trend.
pub const TREND_POINTS: usize = 10;

/// Calendar-day key (`YYYY-MM-DD`) of a log date in `tz`.
pub fn day_key_in<Tz: TimeZone>(date: &LogDate, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date_key_in(date.to_datetime(), tz)
}

/// Calendar-day key in the process's local time zone.
pub fn day_key(date: &LogDate) -> String {
    day_key_in(date, &Local)
}

fn date_key_in<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%Y-%m-%d").to_string()
}

/// Summed nutrition of the food entries on one day.
pub fn totals_for_day<Tz: TimeZone>(logs: &[LogEntry], key: &str, tz: &Tz) -> Nutrition
where
    Tz::Offset: std::fmt::Display,
{
    logs.iter()
        .filter_map(|log| {
            let nutrition = log.nutrition()?;
            (day_key_in(&log.date, tz) == key).then_some(*nutrition)
        })
        .fold(Nutrition::default(), |acc, n| acc + n)
}

/// Food totals for the day containing `now`.
pub fn today_totals_in<Tz: TimeZone>(logs: &[LogEntry], now: DateTime<Utc>, tz: &Tz) -> Nutrition
where
    Tz::Offset: std::fmt::Display,
{
    totals_for_day(logs, &date_key_in(now, tz), tz)
}

/// Food totals for one day of the rolling series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DayTotals {
    pub date: String,
    pub nutrition: Nutrition,
}

/// Seven consecutive calendar days ending with the day of `now`, oldest
/// first. Days are stepped on the local calendar, so a 23- or 25-hour day
/// never skips or repeats a date.
pub fn weekly_series_in<Tz: TimeZone>(
    logs: &[LogEntry],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<DayTotals>
where
    Tz::Offset: std::fmt::Display,
{
    let today = now.with_timezone(tz).date_naive();
    (0..WEEK_DAYS)
        .rev()
        .filter_map(|days_ago| today.checked_sub_days(Days::new(days_ago as u64)))
        .map(|day| {
            let date = day.format("%Y-%m-%d").to_string();
            let nutrition = totals_for_day(logs, &date, tz);
            DayTotals { date, nutrition }
        })
        .collect()
}

/// Calories left today, never negative.
pub fn remaining_calories(target: i64, eaten: i64) -> i64 {
    target.saturating_sub(eaten).max(0)
}

/// Share of the calorie target eaten, in percent, capped at 100.
pub fn progress_percent(eaten: i64, target: i64) -> f64 {
    if target <= 0 {
        return 100.0;
    }
    (eaten as f64 / target as f64 * 100.0).min(100.0)
}

/// One point of the weight trend, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeightPoint {
    pub date: String,
    pub value: f64,
}

/// The most recent weight entries, oldest to newest.
///
/// `logs` are expected newest first, as the session keeps them. The trend
/// is only meaningful with at least two points; see [`has_trend`].
pub fn weight_trend(logs: &[LogEntry], unit: WeightUnit) -> Vec<WeightPoint> {
    let mut points: Vec<WeightPoint> = logs
        .iter()
        .filter_map(|log| {
            let kg = log.weight_kg()?;
            let value = to_display_weight(Some(kg), unit).parse().unwrap_or(0.0);
            Some(WeightPoint {
                date: day_key(&log.date),
                value,
            })
        })
        .take(TREND_POINTS)
        .collect();
    points.reverse();
    points
}

pub fn has_trend(points: &[WeightPoint]) -> bool {
    points.len() >= 2
}

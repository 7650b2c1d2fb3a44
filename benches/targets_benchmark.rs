use chrono::{DateTime, Duration, FixedOffset, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use smartfit::models::{
    ActivityLevel, LogDate, LogEntry, LogKind, Meal, Nutrition, Profile, WeightUnit,
};
use smartfit::services::summary::{today_totals_in, weekly_series_in, weight_trend};
use smartfit::services::targets::calculate_targets;
use std::hint::black_box;

fn benchmark_targets(c: &mut Criterion) {
    let profile = Profile {
        name: Some("Ana".to_string()),
        age: Some(30),
        current_weight: Some(80.0),
        goal_weight: Some(70.0),
        activity_level: Some(ActivityLevel::Moderate),
        auto_calc_calories: Some(true),
        ..Default::default()
    };

    c.bench_function("calculate_targets", |b| {
        b.iter(|| calculate_targets(black_box(Some(&profile))))
    });
}

/// A year of history: three meals, a workout and a weigh-in every day.
fn year_of_logs(now: DateTime<Utc>) -> Vec<LogEntry> {
    let mut logs = Vec::new();
    for day in 0..365 {
        let base = now - Duration::days(day);
        for (hour, meal) in [(8, Meal::Breakfast), (12, Meal::Lunch), (19, Meal::Dinner)] {
            logs.push(LogEntry {
                id: Some(format!("{}-{}", day, hour)),
                date: LogDate::from(base - Duration::hours(hour)),
                kind: LogKind::Food {
                    description: "Meal".to_string(),
                    meal: Some(meal),
                    nutrition: Nutrition {
                        calories: 600,
                        protein: 35,
                        carbs: 70,
                        fats: 20,
                    },
                },
            });
        }
        logs.push(LogEntry {
            id: Some(format!("{}-w", day)),
            date: LogDate::Timestamp {
                seconds: (base - Duration::hours(6)).timestamp(),
                nanoseconds: 0,
            },
            kind: LogKind::Weight {
                value: 80.0 - day as f64 * 0.02,
            },
        });
    }
    logs
}

fn benchmark_summaries(c: &mut Criterion) {
    let now = Utc::now();
    let logs = year_of_logs(now);
    let Some(tz) = FixedOffset::west_opt(5 * 3600) else {
        return;
    };

    let mut group = c.benchmark_group("summaries");

    group.bench_function("today_totals", |b| {
        b.iter(|| today_totals_in(black_box(&logs), now, &tz))
    });

    group.bench_function("weekly_series", |b| {
        b.iter(|| weekly_series_in(black_box(&logs), now, &tz))
    });

    group.bench_function("weight_trend", |b| {
        b.iter(|| weight_trend(black_box(&logs), WeightUnit::Lbs))
    });

    group.finish();
}

criterion_group!(benches, benchmark_targets, benchmark_summaries);
criterion_main!(benches);

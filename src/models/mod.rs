// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod log_entry;
pub mod onboarding;
pub mod profile;

pub use log_entry::{LogDate, LogEntry, LogKind, Meal, Nutrition};
pub use onboarding::OnboardingForm;
pub use profile::{ActivityLevel, Profile, WeightUnit};

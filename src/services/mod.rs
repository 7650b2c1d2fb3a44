// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod coach;
pub mod identity;
pub mod summary;
pub mod targets;

pub use coach::{Coach, CoachError, GeminiClient, LanguageModel};
pub use identity::{AuthError, FirebaseAuth, Identity, IdentityProvider, MemoryIdentityProvider};
pub use targets::{calculate_targets, Targets};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (session readiness, security headers).

pub mod ready;
pub mod security;

pub use ready::require_ready;

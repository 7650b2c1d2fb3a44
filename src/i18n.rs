// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing message lookup for the two supported locales.
//!
//! The locale only selects labels; it never changes stored data.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "fr" => Ok(Locale::Fr),
            other => Err(format!("Unsupported locale: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    AuthFailed,
    InvalidCredentials,
    EmailInUse,
    WeakPassword,
    CouldNotAnalyzeFood,
    CoachConnectionError,
    OnlineSync,
    OfflineMode,
}

/// Look up a message in the given locale.
pub fn text(locale: Locale, message: Message) -> &'static str {
    match (locale, message) {
        (Locale::En, Message::AuthFailed) => "Authentication failed.",
        (Locale::En, Message::InvalidCredentials) => "Invalid email or password.",
        (Locale::En, Message::EmailInUse) => "Email already in use.",
        (Locale::En, Message::WeakPassword) => "Password too weak.",
        (Locale::En, Message::CouldNotAnalyzeFood) => "Could not analyze food.",
        (Locale::En, Message::CoachConnectionError) => "Error connecting to AI.",
        (Locale::En, Message::OnlineSync) => "ONLINE SYNC",
        (Locale::En, Message::OfflineMode) => "OFFLINE MODE",

        (Locale::Fr, Message::AuthFailed) => "Échec de l'authentification.",
        (Locale::Fr, Message::InvalidCredentials) => "Courriel ou mot de passe invalide.",
        (Locale::Fr, Message::EmailInUse) => "Ce courriel est déjà utilisé.",
        (Locale::Fr, Message::WeakPassword) => "Mot de passe trop faible.",
        (Locale::Fr, Message::CouldNotAnalyzeFood) => "Impossible d'analyser l'aliment.",
        (Locale::Fr, Message::CoachConnectionError) => "Erreur de connexion à l'IA.",
        (Locale::Fr, Message::OnlineSync) => "SYNCHRO EN LIGNE",
        (Locale::Fr, Message::OfflineMode) => "MODE HORS LIGNE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parsing() {
        assert_eq!("FR".parse::<Locale>(), Ok(Locale::Fr));
        assert_eq!(" en ".parse::<Locale>(), Ok(Locale::En));
        assert!("de".parse::<Locale>().is_err());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            text(Locale::En, Message::EmailInUse),
            "Email already in use."
        );
        assert_ne!(
            text(Locale::Fr, Message::EmailInUse),
            text(Locale::En, Message::EmailInUse)
        );
    }
}

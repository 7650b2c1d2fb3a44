// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coach backed by the Gemini API.
//!
//! Two uses of a single generate call:
//! - coaching replies to free-text questions, with the profile as context
//! - food identification (text and/or photo) returning candidate nutrition

use crate::models::{LogEntry, LogKind, Meal, Nutrition, Profile};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors from the model API or from interpreting its reply.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("Assistant is not configured")]
    NotConfigured,

    #[error("Nothing to ask")]
    EmptyInput,

    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Model reply is not usable: {0}")]
    Malformed(String),
}

/// Image sent alongside a prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    /// Decode a base64 payload, with or without a `data:...;base64,` prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        let payload = match encoded.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        Ok(Self::jpeg(STANDARD.decode(payload.trim())?))
    }
}

/// A single prompt to the model.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// Let the model consult web search
    pub grounded: bool,
}

/// External language model: one prompt in, generated text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, CoachError>;
}

// ─── Gemini Client ───────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
    Other(serde_json::Value),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiApiError {
    message: String,
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE_URL, self.model, self.api_key
        )
    }

    fn build_request(request: &ModelRequest) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image) = &request.image {
            parts.push(GeminiPart::InlineData {
                inline_data: GeminiBlob {
                    mime_type: image.mime_type.clone(),
                    data: STANDARD.encode(&image.data),
                },
            });
        }

        GeminiRequest {
            contents: vec![GeminiContent { parts }],
            tools: if request.grounded {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        }
    }

    fn map_api_error(status: u16, response_text: &str) -> CoachError {
        let message = serde_json::from_str::<GeminiResponse>(response_text)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| response_text.to_owned(), |e| e.message);
        CoachError::Api { status, message }
    }

    /// First text part of the first candidate.
    fn extract_text(response: GeminiResponse) -> Result<String, CoachError> {
        if let Some(error) = response.error {
            return Err(CoachError::Api {
                status: 200,
                message: error.message,
            });
        }
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| {
                c.parts.into_iter().find_map(|p| match p {
                    GeminiPart::Text { text } => Some(text),
                    _ => None,
                })
            })
            .filter(|text| !text.trim().is_empty())
            .ok_or(CoachError::EmptyResponse)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, CoachError> {
        tracing::debug!(
            model = %self.model,
            with_image = request.image.is_some(),
            "Sending request to Gemini API"
        );

        let response = self
            .http
            .post(self.build_url())
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| CoachError::Transport(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CoachError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &response_text));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Gemini response");
            CoachError::Malformed(e.to_string())
        })?;

        Self::extract_text(parsed)
    }
}

// ─── Coach ───────────────────────────────────────────────────────

/// One candidate match from food identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FoodOption {
    pub name: String,
    #[serde(default, deserialize_with = "crate::models::log_entry::rounded")]
    pub calories: i64,
    #[serde(default, deserialize_with = "crate::models::log_entry::rounded")]
    pub protein: i64,
    #[serde(default, deserialize_with = "crate::models::log_entry::rounded")]
    pub carbs: i64,
    #[serde(default, deserialize_with = "crate::models::log_entry::rounded")]
    pub fats: i64,
}

impl FoodOption {
    /// Food log entry for a confirmed match.
    pub fn into_entry(self, meal: Option<Meal>) -> LogEntry {
        LogEntry::new(LogKind::Food {
            description: self.name,
            meal,
            nutrition: Nutrition {
                calories: self.calories,
                protein: self.protein,
                carbs: self.carbs,
                fats: self.fats,
            },
        })
    }
}

/// Coaching and food identification on top of a [`LanguageModel`].
#[derive(Clone)]
pub struct Coach {
    model: Option<Arc<dyn LanguageModel>>,
}

impl Coach {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model: Some(model) }
    }

    /// A coach without a model; every request fails with `NotConfigured`.
    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> Result<&Arc<dyn LanguageModel>, CoachError> {
        self.model.as_ref().ok_or(CoachError::NotConfigured)
    }

    /// Answer a question with the profile as context. Markdown reply.
    pub async fn ask(&self, profile: Option<&Profile>, question: &str) -> Result<String, CoachError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoachError::EmptyInput);
        }
        let request = ModelRequest {
            prompt: coach_prompt(profile, question),
            ..Default::default()
        };
        self.model()?.generate(&request).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Coach request failed");
        })
    }

    /// Candidate matches for a described and/or photographed food.
    pub async fn identify_food(
        &self,
        description: Option<&str>,
        image: Option<InlineImage>,
    ) -> Result<Vec<FoodOption>, CoachError> {
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        if description.is_none() && image.is_none() {
            return Err(CoachError::EmptyInput);
        }

        let request = ModelRequest {
            prompt: food_prompt(description),
            image,
            grounded: true,
        };
        let reply = self.model()?.generate(&request).await?;
        parse_food_options(&reply).inspect_err(|e| {
            tracing::warn!(error = %e, "Food identification reply not usable");
        })
    }
}

fn display(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| v.to_string())
}

pub fn coach_prompt(profile: Option<&Profile>, question: &str) -> String {
    let context = format!(
        "Profile: {}kg, Goal: {}kg, Age: {}",
        display(profile.and_then(|p| p.current_weight)),
        display(profile.and_then(|p| p.goal_weight)),
        display(profile.and_then(|p| p.age)),
    );
    format!(
        "You are FitBot. Context: {}. User asks: \"{}\". Keep it motivating, short, and use markdown.",
        context, question
    )
}

pub fn food_prompt(description: Option<&str>) -> String {
    let mut prompt = String::from("Identify 3-5 distinct matches for this food.\n");
    if let Some(d) = description {
        prompt.push_str(&format!("User description: \"{}\".\n", d));
    }
    prompt.push_str(
        "Prioritize Canadian data/brands (e.g. PC, Kirkland).\n\
         Include at least one \"Generic\" option.\n\
         Return a valid JSON ARRAY of objects. Each object must have:\n\
         - \"name\": string\n\
         - \"calories\": number\n\
         - \"protein\": number\n\
         - \"carbs\": number\n\
         - \"fats\": number\n\
         Do not add markdown.",
    );
    prompt
}

/// Parse a food-identification reply.
///
/// Tolerates markdown code fences and a single object instead of an array.
/// An empty result is an error.
pub fn parse_food_options(reply: &str) -> Result<Vec<FoodOption>, CoachError> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(CoachError::EmptyResponse);
    }

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| CoachError::Malformed(e.to_string()))?;
    let options: Vec<FoodOption> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        serde_json::Value::Object(_) => serde_json::from_value(value).map(|o| vec![o]),
        other => {
            return Err(CoachError::Malformed(format!(
                "expected array or object, got {}",
                other
            )))
        }
    }
    .map_err(|e| CoachError::Malformed(e.to_string()))?;

    if options.is_empty() {
        return Err(CoachError::EmptyResponse);
    }
    Ok(options)
}

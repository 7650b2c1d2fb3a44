// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore REST client acting on behalf of a signed-in end user.
//!
//! Requests carry the user's Firebase ID token, so security rules scope every
//! read and write to `users/{uid}/...`. Documents are converted between plain
//! JSON and Firestore's typed value encoding at this boundary.

use crate::db::{Document, DocumentStore, StoreError, WriteMode};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const FIRESTORE_HOST: &str = "https://firestore.googleapis.com";
const PAGE_SIZE: u32 = 300;

/// Source of the bearer token for store requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid ID token, refreshing it if needed.
    async fn id_token(&self) -> Result<String, StoreError>;
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    emulator: bool,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub fn new(
        http: reqwest::Client,
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, StoreError> {
        if project_id.is_empty()
            || !project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(StoreError::Decode(format!(
                "Invalid Firestore project id: {:?}",
                project_id
            )));
        }

        let (host, emulator) = match std::env::var("FIRESTORE_EMULATOR_HOST") {
            Ok(host) if !host.is_empty() => (format!("http://{}", host), true),
            _ => (FIRESTORE_HOST.to_string(), false),
        };

        if emulator {
            tracing::info!(host = %host, "Using Firestore Emulator");
        }

        Ok(Self {
            http,
            base_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                host, project_id
            ),
            tokens,
            emulator,
        })
    }

    /// Check that the Firestore endpoint answers at all.
    ///
    /// Any HTTP response (including 401/403 for the unauthenticated probe)
    /// counts as reachable; only transport failures are errors.
    pub async fn probe(&self) -> Result<(), StoreError> {
        self.http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        if self.emulator {
            // The emulator accepts "owner" as an admin credential
            return Ok(request.bearer_auth("owner"));
        }
        let token = self.tokens.id_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    /// Check response status and return error if not successful.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);

        if status == 401 {
            return Err(StoreError::Unauthenticated);
        }
        Err(StoreError::Http { status, message })
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self.send(self.http.get(self.url(path))).await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let raw: RawDocument = Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(decode_fields(raw.fields)))
    }

    async fn write_document(
        &self,
        path: &str,
        data: &Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let fields = encode_fields(data)?;
        let mut request = self.http.patch(self.url(path));

        if mode == WriteMode::Merge {
            let mask: Vec<(&str, String)> = data
                .as_object()
                .map(|obj| {
                    obj.keys()
                        .map(|k| ("updateMask.fieldPaths", field_path(k)))
                        .collect()
                })
                .unwrap_or_default();
            request = request.query(&mask);
        }

        let response = self
            .send(request.json(&json!({ "fields": fields })))
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn read_collection(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .send(self.http.get(self.url(path)).query(&query))
                .await?;
            if response.status().as_u16() == 404 {
                break;
            }
            let page: ListResponse = Self::check_response(response)
                .await?
                .json()
                .await
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            documents.extend(page.documents.into_iter().map(|raw| Document {
                id: document_id(&raw.name),
                data: decode_fields(raw.fields),
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn add_to_collection(&self, path: &str, data: &Value) -> Result<String, StoreError> {
        let fields = encode_fields(data)?;
        let response = self
            .send(self.http.post(self.url(path)).json(&json!({ "fields": fields })))
            .await?;
        let raw: RawDocument = Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(document_id(&raw.name))
    }

    async fn delete_document(&self, path: &str) -> Result<(), StoreError> {
        let response = self.send(self.http.delete(self.url(path))).await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

// ─── Value Encoding ───────────────────────────────────────────────

/// Last path segment of a full document name.
fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or_default().to_string()
}

/// Field paths that are not plain identifiers must be backtick-quoted.
fn field_path(key: &str) -> String {
    let plain = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Encode a JSON object as a Firestore `fields` map.
pub fn encode_fields(data: &Value) -> Result<Map<String, Value>, StoreError> {
    match data {
        Value::Object(obj) => Ok(obj
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect()),
        other => Err(StoreError::Decode(format!(
            "Documents must be JSON objects, got {}",
            other
        ))),
    }
}

/// Encode one JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(obj) => {
            let fields: Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decode a Firestore `fields` map into a plain JSON object.
pub fn decode_fields(fields: Map<String, Value>) -> Value {
    Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k, decode_value(&v)))
            .collect(),
    )
}

/// Decode one Firestore typed value. Timestamps, bytes and references
/// decode as strings.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed.map_or(Value::Null, Value::from)
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number)
        }
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner["values"]
                .as_array()
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => decode_fields(inner["fields"].as_object().cloned().unwrap_or_default()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_log_entry() {
        let entry = json!({
            "type": "food",
            "description": "Apple",
            "nutrition": {"calories": 95, "protein": 0, "carbs": 25, "fats": 0},
            "date": "2025-03-01T08:00:00.000Z",
        });
        let fields = encode_fields(&entry).unwrap();
        assert_eq!(fields["type"], json!({"stringValue": "food"}));
        assert_eq!(
            fields["nutrition"]["mapValue"]["fields"]["calories"],
            json!({"integerValue": "95"})
        );
    }

    #[test]
    fn test_decode_handles_every_kind() {
        let fields = json!({
            "name": {"stringValue": "Ana"},
            "age": {"integerValue": "41"},
            "currentWeight": {"doubleValue": 68.5},
            "autoCalcCalories": {"booleanValue": false},
            "targetCalories": {"nullValue": null},
            "date": {"timestampValue": "2025-03-01T08:00:00Z"},
            "tags": {"arrayValue": {"values": [{"stringValue": "a"}]}},
            "empty": {"arrayValue": {}},
        });
        let decoded = decode_fields(fields.as_object().cloned().unwrap());
        assert_eq!(
            decoded,
            json!({
                "name": "Ana",
                "age": 41,
                "currentWeight": 68.5,
                "autoCalcCalories": false,
                "targetCalories": null,
                "date": "2025-03-01T08:00:00Z",
                "tags": ["a"],
                "empty": [],
            })
        );
    }

    #[test]
    fn test_floats_stay_doubles() {
        assert_eq!(encode_value(&json!(68.0)), json!({"doubleValue": 68.0}));
        assert_eq!(encode_value(&json!(68)), json!({"integerValue": "68"}));
    }

    #[test]
    fn test_non_object_document_rejected() {
        assert!(encode_fields(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("currentWeight"), "currentWeight");
        assert_eq!(field_path("weird-key"), "`weird-key`");
        assert_eq!(document_id("projects/p/databases/(default)/documents/users/u/logs/abc"), "abc");
    }
}

// Deterministic cache key derivation
// Author: kelexine (https://github.com/kelexine)

use crate::models::GenerateRequest;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// SHA-256 digest over the normalized request.
///
/// Two logically identical requests produce the same key regardless of the
/// order their JSON object fields were written in: object keys are sorted
/// before hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a dispatcher request.
    ///
    /// Covers model id, ordered contents, system instruction, generation
    /// config, safety settings and tools.
    pub fn from_request(request: &GenerateRequest) -> Self {
        let mut normalized = Map::new();
        normalized.insert("model".to_string(), Value::String(request.model.clone()));
        normalized.insert("contents".to_string(), to_value(&request.contents));
        normalized.insert(
            "systemInstruction".to_string(),
            to_value(&request.system_instruction),
        );
        normalized.insert(
            "generationConfig".to_string(),
            to_value(&request.generation_config),
        );
        normalized.insert(
            "safetySettings".to_string(),
            to_value(&request.safety_settings),
        );
        normalized.insert("tools".to_string(), to_value(&request.tools));

        Self::from_json(&Value::Object(normalized))
    }

    /// Key for an arbitrary JSON request body.
    pub fn from_json(value: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(value, &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    // Model types contain only strings, numbers and maps; this cannot fail.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Serialize `value` with object keys in sorted order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationConfig, Tool};

    fn request(temperature: f32) -> GenerateRequest {
        GenerateRequest::text("gemini-2.5-flash", "Hello")
            .with_system_instruction("You are a helpful assistant.")
            .with_generation_config(GenerationConfig {
                temperature: Some(temperature),
                max_output_tokens: Some(256),
                ..Default::default()
            })
    }

    #[test]
    fn test_same_request_same_key() {
        assert_eq!(
            CacheKey::from_request(&request(0.5)),
            CacheKey::from_request(&request(0.5))
        );
    }

    #[test]
    fn test_temperature_changes_key() {
        assert_ne!(
            CacheKey::from_request(&request(0.5)),
            CacheKey::from_request(&request(0.7))
        );
    }

    #[test]
    fn test_model_changes_key() {
        let mut other = request(0.5);
        other.model = "gemini-2.5-pro".to_string();
        assert_ne!(CacheKey::from_request(&request(0.5)), CacheKey::from_request(&other));
    }

    #[test]
    fn test_builtin_tool_changes_key() {
        let tool: Tool = serde_json::from_str(r#"{"googleSearch": {}}"#).unwrap();
        let with_search = request(0.5).with_tools(vec![tool]);
        let with_nothing = request(0.5).with_tools(vec![Tool::default()]);
        assert_ne!(
            CacheKey::from_request(&with_search),
            CacheKey::from_request(&with_nothing)
        );
    }

    #[test]
    fn test_json_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":[1,2],"x":"s"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":"s","y":[1,2]},"b":1}"#).unwrap();
        assert_eq!(CacheKey::from_json(&a), CacheKey::from_json(&b));
    }

    #[test]
    fn test_array_order_is_significant() {
        let a: Value = serde_json::from_str(r#"{"a":[1,2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":[2,1]}"#).unwrap();
        assert_ne!(CacheKey::from_json(&a), CacheKey::from_json(&b));
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = CacheKey::from_request(&request(0.5));
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key.short().len(), 16);
    }
}

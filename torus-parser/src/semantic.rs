//! Semantic-model parsing via a language-understanding service.
//!
//! Sends the raw text plus the operation vocabulary to an OpenAI-compatible
//! chat-completions endpoint and expects a JSON object conforming to the
//! parsed-command schema. This is the only strategy allowed to fail
//! outward as a degraded-but-valid result: every service failure is
//! absorbed into the fallback command, never surfaced as an engine error.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use torus_domain::{ControlOperation, Intent, ParsedCommand, Priority, TargetId};

use crate::error::{ParseResult, ServiceError};
use crate::strategy::ParseStrategy;

/// Operation vocabulary handed to the service with every request.
const VOCABULARY: &str = "\
Available control points:
- Coil current (TOK:COIL:CURR): 0-2000 A, temperature control
- Heater power (TOK:HEATER:POW): 0-100 %, temperature control
- Gas injection (TOK:GAS:FLOW): 0-1000 sccm, density control
- Toroidal field (TOK:MAGNET:BT): 0-3.5 T, plasma stabilization";

/// Response schema the service is asked to produce.
const RESPONSE_SCHEMA: &str = r#"{
    "intent": "temperature_control|density_control|heating_control|combined_control",
    "target_value": numeric_value,
    "duration_seconds": time_in_seconds,
    "operations": [
        {
            "target_id": "control_point_name",
            "value": numeric_value,
            "unit": "unit",
            "description": "description",
            "priority": 1
        }
    ],
    "safety_checks": ["check1", "check2"],
    "estimated_seconds": estimated_execution_time
}"#;

/// Configuration for the semantic parsing service.
#[derive(Debug, Clone)]
pub struct SemanticConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash)
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name to request
    pub model: String,
}

/// Strategy that defers to the semantic parsing service.
pub struct SemanticStrategy {
    config: SemanticConfig,
    client: reqwest::Client,
}

impl SemanticStrategy {
    /// Create the strategy with a fresh HTTP client.
    pub fn new(config: SemanticConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn system_prompt() -> String {
        format!(
            "You are an expert in tokamak plasma control systems.\n\
             Analyze natural language commands and convert them to device \
             control operations.\n\n{}\n\nRespond with a single JSON object \
             in this format:\n{}",
            VOCABULARY, RESPONSE_SCHEMA
        )
    }

    fn build_headers(&self) -> Result<HeaderMap, ServiceError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| ServiceError::Request(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Call the service and convert its reply into a parsed command.
    async fn interpret(&self, raw_text: &str) -> Result<ParsedCommand, ServiceError> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": Self::system_prompt()},
                {"role": "user", "content": format!("Please analyze this command: {}", raw_text)}
            ],
            "temperature": 0.1,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .headers(self.build_headers()?)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidJson(e.to_string()))?;

        let content = body
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or(ServiceError::MissingField("choices[0].message.content"))?;

        let reply: SemanticReply = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| ServiceError::InvalidJson(e.to_string()))?;

        reply.into_command(raw_text)
    }
}

/// Remove a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Wire shape of the service reply.
#[derive(Debug, Deserialize)]
struct SemanticReply {
    intent: Intent,
    #[serde(default)]
    target_value: Option<f64>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    operations: Vec<SemanticOperation>,
    #[serde(default)]
    safety_checks: Vec<String>,
    #[serde(default)]
    estimated_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SemanticOperation {
    target_id: String,
    value: f64,
    unit: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_priority")]
    priority: u8,
}

fn default_priority() -> u8 {
    1
}

impl SemanticReply {
    fn into_command(self, raw_text: &str) -> Result<ParsedCommand, ServiceError> {
        let mut operations = Vec::with_capacity(self.operations.len());
        for op in self.operations {
            let target_id = TargetId::new(op.target_id)
                .map_err(|e| ServiceError::Schema(e.to_string()))?;
            let priority = Priority::try_from(op.priority)
                .map_err(|e| ServiceError::Schema(e.to_string()))?;
            operations.push(
                ControlOperation::new(target_id, op.value, op.unit, op.description)
                    .with_priority(priority),
            );
        }

        ParsedCommand::new(
            raw_text,
            self.intent,
            self.target_value,
            self.duration_seconds,
            operations,
            self.safety_checks,
            self.estimated_seconds.unwrap_or(10.0),
        )
        .map_err(|e| ServiceError::Schema(e.to_string()))
    }
}

#[async_trait]
impl ParseStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn attempt(&self, raw_text: &str) -> ParseResult<Option<ParsedCommand>> {
        match self.interpret(raw_text).await {
            Ok(command) => {
                debug!(intent = %command.intent, "Semantic parse succeeded");
                Ok(Some(command))
            },
            Err(e) => {
                warn!(error = %e, "Semantic parse failed, falling back to manual review");
                Ok(Some(ParsedCommand::fallback(raw_text)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> SemanticConfig {
        SemanticConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_fallback() {
        // Reserved TEST-NET address: connections fail fast-ish and the
        // strategy must absorb the failure.
        let strategy = SemanticStrategy::new(test_config("http://127.0.0.1:1"));

        let command = strategy.attempt("adjust density to 3e19").await.unwrap().unwrap();

        assert_eq!(command.intent, Intent::Unknown);
        assert!(command.operations.is_empty());
        assert_eq!(command.safety_checks, vec!["manual_review".to_string()]);
        assert_eq!(command.estimated_seconds, 5.0);
    }

    #[test]
    fn test_reply_conversion() {
        let json = r#"{
            "intent": "density_control",
            "target_value": 3e19,
            "operations": [
                {"target_id": "TOK:GAS:FLOW", "value": 300.0, "unit": "sccm",
                 "description": "Density control via gas flow", "priority": 1}
            ],
            "safety_checks": ["density_range"],
            "estimated_seconds": 8.0
        }"#;

        let reply: SemanticReply = serde_json::from_str(json).unwrap();
        let command = reply.into_command("adjust density to 3e19").unwrap();

        assert_eq!(command.intent, Intent::DensityControl);
        assert_eq!(command.operations.len(), 1);
        assert_eq!(command.operations[0].priority, Priority::High);
        assert_eq!(command.estimated_seconds, 8.0);
    }

    #[test]
    fn test_reply_with_empty_operations_is_rejected() {
        let json = r#"{"intent": "temperature_control", "operations": []}"#;
        let reply: SemanticReply = serde_json::from_str(json).unwrap();
        assert!(matches!(
            reply.into_command("x"),
            Err(ServiceError::Schema(_))
        ));
    }

    #[test]
    fn test_reply_with_bad_target_is_rejected() {
        let json = r#"{
            "intent": "temperature_control",
            "operations": [
                {"target_id": "has spaces", "value": 1.0, "unit": "A"}
            ]
        }"#;
        let reply: SemanticReply = serde_json::from_str(json).unwrap();
        assert!(matches!(reply.into_command("x"), Err(ServiceError::Schema(_))));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_missing_estimated_seconds_defaults() {
        let json = r#"{
            "intent": "heating_control",
            "operations": [
                {"target_id": "TOK:HEATER:POW", "value": 80.0, "unit": "%"}
            ]
        }"#;
        let reply: SemanticReply = serde_json::from_str(json).unwrap();
        let command = reply.into_command("increase heater power to 80%").unwrap();
        assert_eq!(command.estimated_seconds, 10.0);
    }
}

//! Value Objects for the Torus Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object and lifecycle validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Target id must be a non-empty, whitespace-free channel name
    #[error("Invalid target id: {0}")]
    InvalidTargetId(String),

    /// Priority must be 1, 2, or 3
    #[error("Invalid priority: {0}")]
    InvalidPriority(u8),

    /// Parsed command violated a structural invariant
    #[error("Invalid parsed command: {0}")]
    InvalidParsedCommand(String),

    /// Invalid execution state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

// =============================================================================
// TargetId
// =============================================================================

/// TargetId names a control or monitor point in the device network
/// (e.g. `TOK:COIL:CURR`).
///
/// # Invariants
/// - Non-empty
/// - No whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Create a new TargetId with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTargetId` if the name is empty or
    /// contains whitespace
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidTargetId("Target id must be non-empty".to_string()));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidTargetId(format!(
                "Target id cannot contain whitespace: {:?}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the target name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Priority of a control operation.
///
/// Serialized as the integer 1 (high), 2 (medium), or 3 (low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    /// Executed first, safety-relevant
    High,
    /// Normal control operation
    Medium,
    /// Best-effort adjustment
    Low,
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        match priority {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(DomainError::InvalidPriority(other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

// =============================================================================
// Intent
// =============================================================================

/// Intent classifies the purpose of a parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Plasma temperature control (coil current, heater power)
    TemperatureControl,
    /// Plasma density control (gas flow, pump speed)
    DensityControl,
    /// Auxiliary heating control
    HeatingControl,
    /// Multiple control families in one command
    CombinedControl,
    /// Command could not be understood; needs manual review
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::TemperatureControl => "temperature_control",
            Intent::DensityControl => "density_control",
            Intent::HeatingControl => "heating_control",
            Intent::CombinedControl => "combined_control",
            Intent::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// ControlOperation
// =============================================================================

/// One device-facing action: write `value` to `target_id`.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOperation {
    /// Control point to write
    pub target_id: TargetId,
    /// Value to write, in engineering units
    pub value: f64,
    /// Engineering unit (e.g. "A", "%", "sccm", "T")
    pub unit: String,
    /// Human-readable description of what this operation does
    pub description: String,
    /// Dispatch priority
    pub priority: Priority,
}

impl ControlOperation {
    /// Create a high-priority control operation.
    pub fn new(
        target_id: TargetId,
        value: f64,
        unit: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            target_id,
            value,
            unit: unit.into(),
            description: description.into(),
            priority: Priority::High,
        }
    }

    /// Set the dispatch priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

// =============================================================================
// ParsedCommand
// =============================================================================

/// Structured result of parsing a natural-language instruction.
///
/// # Invariants
/// - `operations` is empty only when `intent` is [`Intent::Unknown`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// The raw instruction text as submitted
    pub raw_text: String,
    /// Classified purpose of the command
    pub intent: Intent,
    /// Target value extracted from the text (e.g. temperature in keV)
    pub target_value: Option<f64>,
    /// Requested hold duration in seconds, if the text carried one
    pub duration_seconds: Option<f64>,
    /// Device operations to dispatch, in order
    pub operations: Vec<ControlOperation>,
    /// Names of safety checks the validator should consider
    pub safety_checks: Vec<String>,
    /// Estimated wall-clock execution time in seconds
    pub estimated_seconds: f64,
}

impl ParsedCommand {
    /// Create a parsed command with invariant validation.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidParsedCommand` if `operations` is empty
    /// but `intent` is not `Unknown`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        raw_text: impl Into<String>,
        intent: Intent,
        target_value: Option<f64>,
        duration_seconds: Option<f64>,
        operations: Vec<ControlOperation>,
        safety_checks: Vec<String>,
        estimated_seconds: f64,
    ) -> Result<Self, DomainError> {
        if operations.is_empty() && intent != Intent::Unknown {
            return Err(DomainError::InvalidParsedCommand(format!(
                "intent {} requires at least one operation",
                intent
            )));
        }

        Ok(Self {
            raw_text: raw_text.into(),
            intent,
            target_value,
            duration_seconds,
            operations,
            safety_checks,
            estimated_seconds,
        })
    }

    /// Create the degraded-but-valid fallback for an unparseable command.
    ///
    /// This is the only constructor that produces `Intent::Unknown`: no
    /// operations, a `manual_review` safety check, and a nominal estimate.
    pub fn fallback(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            intent: Intent::Unknown,
            target_value: None,
            duration_seconds: None,
            operations: Vec::new(),
            safety_checks: vec!["manual_review".to_string()],
            estimated_seconds: 5.0,
        }
    }

    /// True when the command could not be understood.
    pub fn is_unparsed(&self) -> bool {
        self.intent == Intent::Unknown && self.operations.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // TargetId tests
    #[test]
    fn test_target_id_validation() {
        assert!(TargetId::new("TOK:COIL:CURR").is_ok());
        assert!(TargetId::new("").is_err());
        assert!(TargetId::new("TOK COIL").is_err());
        assert!(TargetId::new("TOK:\tHEATER").is_err());
    }

    #[test]
    fn test_target_id_display() {
        let target = TargetId::new("TOK:HEATER:POW").unwrap();
        assert_eq!(target.as_str(), "TOK:HEATER:POW");
        assert_eq!(target.to_string(), "TOK:HEATER:POW");
    }

    // Priority tests
    #[test]
    fn test_priority_roundtrip() {
        assert_eq!(Priority::try_from(1u8).unwrap(), Priority::High);
        assert_eq!(Priority::try_from(2u8).unwrap(), Priority::Medium);
        assert_eq!(Priority::try_from(3u8).unwrap(), Priority::Low);
        assert!(Priority::try_from(0u8).is_err());
        assert!(Priority::try_from(4u8).is_err());
        assert_eq!(u8::from(Priority::High), 1);
    }

    #[test]
    fn test_priority_serializes_as_integer() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "1");
        let parsed: Priority = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Priority::Medium);
    }

    // Intent tests
    #[test]
    fn test_intent_serde_names() {
        let json = serde_json::to_string(&Intent::TemperatureControl).unwrap();
        assert_eq!(json, "\"temperature_control\"");
        let parsed: Intent = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, Intent::Unknown);
    }

    // ParsedCommand tests
    #[test]
    fn test_parsed_command_requires_operations_for_known_intent() {
        let result = ParsedCommand::new(
            "raise temperature",
            Intent::TemperatureControl,
            Some(10.0),
            None,
            vec![],
            vec![],
            5.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parsed_command_accepts_operations() {
        let operation = ControlOperation::new(
            TargetId::new("TOK:COIL:CURR").unwrap(),
            1400.0,
            "A",
            "Temperature control via coil current",
        );
        let command = ParsedCommand::new(
            "raise temperature to 10 keV",
            Intent::TemperatureControl,
            Some(10.0),
            Some(5.0),
            vec![operation],
            vec!["temperature_range".to_string()],
            5.0,
        )
        .unwrap();

        assert_eq!(command.operations.len(), 1);
        assert!(!command.is_unparsed());
    }

    #[test]
    fn test_fallback_command() {
        let fallback = ParsedCommand::fallback("do something impossible");
        assert_eq!(fallback.intent, Intent::Unknown);
        assert!(fallback.operations.is_empty());
        assert_eq!(fallback.safety_checks, vec!["manual_review".to_string()]);
        assert_eq!(fallback.estimated_seconds, 5.0);
        assert!(fallback.is_unparsed());
    }

    #[test]
    fn test_control_operation_builder() {
        let operation = ControlOperation::new(
            TargetId::new("TOK:GAS:FLOW").unwrap(),
            300.0,
            "sccm",
            "Density control via gas flow",
        )
        .with_priority(Priority::Medium);

        assert_eq!(operation.priority, Priority::Medium);
        assert_eq!(operation.unit, "sccm");
    }
}

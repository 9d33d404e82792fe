//! Demo-mode rule-based parsing.
//!
//! Used when no semantic backend is configured. Extracts the first numeric
//! quantity adjacent to a temperature keyword (or any bare number) and
//! derives a fixed pair of actuator operations from the affine model
//! anchored at the reference temperature. A pure function of the input
//! text: identical input always yields an identical command.

use async_trait::async_trait;
use regex::Regex;

use torus_domain::{model, targets, ControlOperation, Intent, ParsedCommand, TargetId};

use crate::error::ParseResult;
use crate::strategy::ParseStrategy;

/// Target temperature assumed when the text carries no number (keV).
const DEFAULT_TARGET_KEV: f64 = 10.0;

/// Deterministic rule-based strategy for demo mode.
pub struct DemoStrategy {
    /// Ordered extraction patterns, most specific first
    patterns: Vec<Regex>,
}

impl DemoStrategy {
    /// Create the strategy with its fixed pattern list.
    pub fn new() -> Self {
        let patterns = [
            // temperature keyword ... number ... unit
            r"(?:temperature|temp).*?(\d+(?:\.\d+)?)\s*kev",
            // bare number with unit
            r"(\d+(?:\.\d+)?)\s*kev",
            // verb ... number
            r"(?:to|raise|lower|set).*?(\d+(?:\.\d+)?)",
            // any bare number
            r"(\d+(?:\.\d+)?)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("hard-coded pattern is valid"))
        .collect();

        Self { patterns }
    }

    /// Extract the target temperature, or the default when nothing matches.
    fn extract_target(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        for pattern in &self.patterns {
            if let Some(captures) = pattern.captures(&lowered) {
                if let Some(value) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok())
                {
                    return value;
                }
            }
        }
        DEFAULT_TARGET_KEV
    }
}

impl Default for DemoStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParseStrategy for DemoStrategy {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn attempt(&self, raw_text: &str) -> ParseResult<Option<ParsedCommand>> {
        let target = self.extract_target(raw_text);

        let coil_current = model::coil_current_for(target);
        let heater_power = model::heater_power_for(target);

        let operations = vec![
            ControlOperation::new(
                TargetId::new(targets::COIL_CURRENT)
                    .expect("static target names are valid"),
                coil_current,
                "A",
                format!("Temperature control via coil current for {} keV", target),
            ),
            ControlOperation::new(
                TargetId::new(targets::HEATER_POWER)
                    .expect("static target names are valid"),
                heater_power,
                "%",
                format!("Temperature control via heater power for {} keV", target),
            ),
        ];

        let command = ParsedCommand {
            raw_text: raw_text.to_string(),
            intent: Intent::TemperatureControl,
            target_value: Some(target),
            duration_seconds: Some(5.0),
            operations,
            safety_checks: vec!["demo_mode_safety_check".to_string()],
            estimated_seconds: 5.0,
        };

        Ok(Some(command))
    }
}

// =============================================================================
// Tests
// =============================================================================

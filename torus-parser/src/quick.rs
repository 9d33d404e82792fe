//! Quick phrase-template parsing.
//!
//! The production fast path: a fixed ordered set of raise/lower/set/hold
//! templates. On a match it extracts the target value and an optional
//! duration clause, then derives actuator operations from an asymmetric
//! directional model. Declines when no template matches so the semantic
//! strategy gets the text.

use async_trait::async_trait;
use regex::Regex;

use torus_domain::{model, targets, ControlOperation, Intent, ParsedCommand, TargetId};

use crate::error::ParseResult;
use crate::strategy::ParseStrategy;

// Directional model: asymmetric ramps with hard actuator bounds.
const RAISE_BASE_COIL_CURRENT: f64 = 1500.0;
const COIL_CURRENT_MAX: f64 = 2000.0;
const RAISE_BASE_HEATER_POWER: f64 = 70.0;
const HEATER_POWER_MAX: f64 = 100.0;

const LOWER_BASE_COIL_CURRENT: f64 = 1000.0;
const LOWER_COIL_CURRENT_PER_KEV: f64 = 50.0;
const COIL_CURRENT_MIN: f64 = 500.0;
const LOWER_BASE_HEATER_POWER: f64 = 30.0;
const LOWER_HEATER_POWER_PER_KEV: f64 = 3.0;
const HEATER_POWER_MIN: f64 = 10.0;

/// Fast phrase-template strategy.
pub struct QuickPatternStrategy {
    /// Raise/lower/set/hold templates, tried in order
    templates: Vec<Regex>,
    /// Duration clause patterns with their multiplier to seconds
    durations: Vec<(Regex, f64)>,
}

impl QuickPatternStrategy {
    /// Create the strategy with its fixed template set.
    pub fn new() -> Self {
        let templates = [
            r"(?:raise|increase)\s+(?:the\s+)?(?:plasma\s+)?temperature\s+to\s+(\d+(?:\.\d+)?)",
            r"(?:lower|decrease|reduce)\s+(?:the\s+)?(?:plasma\s+)?temperature\s+to\s+(\d+(?:\.\d+)?)",
            r"set\s+(?:the\s+)?(?:plasma\s+)?temperature\s+to\s+(\d+(?:\.\d+)?)",
            r"(?:hold|maintain|keep)\s+(?:the\s+)?(?:plasma\s+)?temperature\s+at\s+(\d+(?:\.\d+)?)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("hard-coded pattern is valid"))
        .collect();

        let durations = vec![
            (
                Regex::new(r"(\d+(?:\.\d+)?)\s*sec(?:ond)?s?\b")
                    .expect("hard-coded pattern is valid"),
                1.0,
            ),
            (
                Regex::new(r"(\d+(?:\.\d+)?)\s*min(?:ute)?s?\b")
                    .expect("hard-coded pattern is valid"),
                60.0,
            ),
            (
                Regex::new(r"(\d+(?:\.\d+)?)\s*h(?:ou)?rs?\b")
                    .expect("hard-coded pattern is valid"),
                3600.0,
            ),
        ];

        Self { templates, durations }
    }

    /// Extract a duration clause, normalized to seconds.
    fn extract_duration(&self, text: &str) -> Option<f64> {
        for (pattern, multiplier) in &self.durations {
            if let Some(captures) = pattern.captures(text) {
                if let Some(value) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok())
                {
                    return Some(value * multiplier);
                }
            }
        }
        None
    }

    /// Derive actuator operations for a target temperature.
    ///
    /// Returns `None` when the target equals the assumed current
    /// temperature: no actuator change can be derived, so the strategy
    /// declines rather than produce an operation-free command.
    fn derive_operations(target: f64) -> Option<Vec<ControlOperation>> {
        let coil_target =
            TargetId::new(targets::COIL_CURRENT).expect("static target names are valid");
        let heater_target =
            TargetId::new(targets::HEATER_POWER).expect("static target names are valid");

        if target > model::REFERENCE_TEMP_KEV {
            let delta = target - model::REFERENCE_TEMP_KEV;
            let coil_current =
                (RAISE_BASE_COIL_CURRENT + delta * model::COIL_CURRENT_PER_KEV).min(COIL_CURRENT_MAX);
            let heater_power =
                (RAISE_BASE_HEATER_POWER + delta * model::HEATER_POWER_PER_KEV).min(HEATER_POWER_MAX);

            Some(vec![
                ControlOperation::new(
                    coil_target,
                    coil_current,
                    "A",
                    format!("Temperature control via coil current for {} keV", target),
                ),
                ControlOperation::new(
                    heater_target,
                    heater_power,
                    "%",
                    format!("Temperature control via heater power for {} keV", target),
                ),
            ])
        } else if target < model::REFERENCE_TEMP_KEV {
            let delta = model::REFERENCE_TEMP_KEV - target;
            let coil_current =
                (LOWER_BASE_COIL_CURRENT - delta * LOWER_COIL_CURRENT_PER_KEV).max(COIL_CURRENT_MIN);
            let heater_power =
                (LOWER_BASE_HEATER_POWER - delta * LOWER_HEATER_POWER_PER_KEV).max(HEATER_POWER_MIN);

            Some(vec![
                ControlOperation::new(
                    coil_target,
                    coil_current,
                    "A",
                    format!("Temperature control via coil current reduction for {} keV", target),
                ),
                ControlOperation::new(
                    heater_target,
                    heater_power,
                    "%",
                    format!("Temperature control via heater power reduction for {} keV", target),
                ),
            ])
        } else {
            None
        }
    }
}

impl Default for QuickPatternStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParseStrategy for QuickPatternStrategy {
    fn name(&self) -> &'static str {
        "quick_pattern"
    }

    async fn attempt(&self, raw_text: &str) -> ParseResult<Option<ParsedCommand>> {
        let lowered = raw_text.to_lowercase();

        for template in &self.templates {
            let Some(captures) = template.captures(&lowered) else {
                continue;
            };
            let Some(target) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok())
            else {
                continue;
            };

            let Some(operations) = Self::derive_operations(target) else {
                return Ok(None);
            };

            let duration = self.extract_duration(&lowered);

            let command = ParsedCommand {
                raw_text: raw_text.to_string(),
                intent: Intent::TemperatureControl,
                target_value: Some(target),
                duration_seconds: duration,
                operations,
                safety_checks: vec![
                    "temperature_range".to_string(),
                    "heating_power_limit".to_string(),
                ],
                estimated_seconds: duration.unwrap_or(10.0),
            };

            return Ok(Some(command));
        }

        Ok(None)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(text: &str) -> Option<ParsedCommand> {
        QuickPatternStrategy::new().attempt(text).await.unwrap()
    }

    #[tokio::test]
    async fn test_raise_template() {
        let command = parse("Raise plasma temperature to 10 keV").await.unwrap();

        assert_eq!(command.intent, Intent::TemperatureControl);
        assert_eq!(command.target_value, Some(10.0));
        // 1500 + 2*100 = 1700, 70 + 2*5 = 80
        assert_eq!(command.operations[0].value, 1700.0);
        assert_eq!(command.operations[1].value, 80.0);
        assert_eq!(command.estimated_seconds, 10.0);
    }

    #[tokio::test]
    async fn test_raise_clamps_to_actuator_bounds() {
        let command = parse("raise temperature to 20 keV").await.unwrap();
        assert_eq!(command.operations[0].value, 2000.0);
        assert_eq!(command.operations[1].value, 100.0);
    }

    #[tokio::test]
    async fn test_lower_template() {
        let command = parse("Lower the temperature to 6 keV").await.unwrap();
        // delta 2: 1000 - 100 = 900, 30 - 6 = 24
        assert_eq!(command.operations[0].value, 900.0);
        assert_eq!(command.operations[1].value, 24.0);
    }

    #[tokio::test]
    async fn test_lower_clamps_to_actuator_bounds() {
        let command = parse("lower temperature to 0.5 keV").await.unwrap();
        // delta 7.5: coil 1000-375=625 (above floor), heater 30-22.5=7.5 -> 10
        assert_eq!(command.operations[0].value, 625.0);
        assert_eq!(command.operations[1].value, 10.0);
    }

    #[tokio::test]
    async fn test_duration_clause_seconds() {
        let command = parse("set temperature to 12 keV for 5 seconds").await.unwrap();
        assert_eq!(command.duration_seconds, Some(5.0));
        assert_eq!(command.estimated_seconds, 5.0);
    }

    #[tokio::test]
    async fn test_duration_clause_minutes() {
        let command = parse("hold temperature at 9 keV for 3 minutes").await.unwrap();
        assert_eq!(command.duration_seconds, Some(180.0));
    }

    #[tokio::test]
    async fn test_duration_clause_hours() {
        let command = parse("set temperature to 9 keV for 2 hours").await.unwrap();
        assert_eq!(command.duration_seconds, Some(7200.0));
    }

    #[tokio::test]
    async fn test_declines_on_no_template() {
        assert!(parse("adjust density to 3e19").await.is_none());
        assert!(parse("make it warmer").await.is_none());
    }

    #[tokio::test]
    async fn test_declines_at_reference_temperature() {
        // No actuator delta can be derived for the assumed current value.
        assert!(parse("set temperature to 8 keV").await.is_none());
    }

    #[tokio::test]
    async fn test_deterministic() {
        let first = parse("raise temperature to 11 keV for 30 seconds").await;
        let second = parse("raise temperature to 11 keV for 30 seconds").await;
        assert_eq!(first, second);
    }
}

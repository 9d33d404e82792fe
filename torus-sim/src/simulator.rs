//! Feedback simulator.
//!
//! A small named-value store holding the temperature setpoint/readback pair
//! and the two actuator values, with a first-order convergence model: each
//! tick moves the readback 5% of the remaining distance toward the
//! setpoint. This is the demo stand-in for the live readback stream: a
//! bounded convergence, not a plasma physics model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use torus_domain::{targets, TargetId};

/// Fraction of the setpoint/readback gap closed per tick.
pub const CONVERGENCE_GAIN: f64 = 0.05;

/// Gap below which the readback stops moving.
pub const CONVERGENCE_EPSILON: f64 = 0.01;

/// Maximum retained history samples; the oldest is dropped first.
pub const HISTORY_CAP: usize = 200;

/// One timestamped snapshot of the simulated plasma state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSample {
    /// When the tick ran
    pub timestamp: DateTime<Utc>,
    /// Temperature setpoint (keV)
    pub setpoint: f64,
    /// Temperature readback (keV)
    pub readback: f64,
    /// Coil current (A)
    pub coil_current: f64,
    /// Heater power (%)
    pub heater_power: f64,
}

/// Named-value store with first-order setpoint convergence.
///
/// Ticks are driven externally (the daemon runs one every 500 ms); the
/// simulator itself never schedules anything.
pub struct FeedbackSimulator {
    values: HashMap<TargetId, f64>,
    history: VecDeque<FeedbackSample>,
    setpoint_key: TargetId,
    readback_key: TargetId,
    coil_key: TargetId,
    heater_key: TargetId,
}

impl FeedbackSimulator {
    /// Create a simulator seeded with nominal plasma values.
    pub fn new() -> Self {
        let setpoint_key =
            TargetId::new(targets::TE_SETPOINT).expect("static target names are valid");
        let readback_key =
            TargetId::new(targets::TE_READBACK).expect("static target names are valid");
        let coil_key =
            TargetId::new(targets::COIL_CURRENT).expect("static target names are valid");
        let heater_key =
            TargetId::new(targets::HEATER_POWER).expect("static target names are valid");

        let mut values = HashMap::new();
        values.insert(setpoint_key.clone(), 8.0);
        values.insert(readback_key.clone(), 8.0);
        values.insert(coil_key.clone(), 1200.0);
        values.insert(heater_key.clone(), 50.0);

        Self {
            values,
            history: VecDeque::with_capacity(HISTORY_CAP),
            setpoint_key,
            readback_key,
            coil_key,
            heater_key,
        }
    }

    /// Current value of a named target, if present.
    pub fn get(&self, target_id: &TargetId) -> Option<f64> {
        self.values.get(target_id).copied()
    }

    /// Store a value for a target.
    pub fn set(&mut self, target_id: TargetId, value: f64) {
        self.values.insert(target_id, value);
    }

    /// Snapshot of every named value (for status reporting).
    pub fn snapshot(&self) -> BTreeMap<TargetId, f64> {
        self.values.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Retained sample history, oldest first.
    pub fn history(&self) -> &VecDeque<FeedbackSample> {
        &self.history
    }

    /// Advance the model one tick and record a sample.
    ///
    /// If the readback is more than [`CONVERGENCE_EPSILON`] away from the
    /// setpoint it moves [`CONVERGENCE_GAIN`] of the gap; a sample is
    /// appended either way, dropping the oldest past [`HISTORY_CAP`].
    pub fn tick(&mut self) -> FeedbackSample {
        let setpoint = self.get(&self.setpoint_key).unwrap_or(0.0);
        let readback = self.get(&self.readback_key).unwrap_or(0.0);

        if (setpoint - readback).abs() > CONVERGENCE_EPSILON {
            let next = readback + (setpoint - readback) * CONVERGENCE_GAIN;
            self.values.insert(self.readback_key.clone(), next);
        }

        let sample = FeedbackSample {
            timestamp: Utc::now(),
            setpoint,
            readback: self.get(&self.readback_key).unwrap_or(0.0),
            coil_current: self.get(&self.coil_key).unwrap_or(0.0),
            heater_power: self.get(&self.heater_key).unwrap_or(0.0),
        };

        self.history.push_back(sample.clone());
        if self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }

        sample
    }
}

impl Default for FeedbackSimulator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Per-frame solver interface.

use std::collections::BTreeMap;

use crate::adapter::{self, ElementAdapter};
use crate::circuit::{self, ElementRef, NodeId};
use crate::components::{real_bulb_resistance, Element};
use crate::error::{CircuitError, Result};

use super::companion::DynamicCircuit;
use super::result::{solve_with_adaptive_subdivision, CircuitResult};
use super::subdivision::TimestepSubdivisions;
use super::{ERROR_THRESHOLD, MIN_DT};

/// Configuration for the frame solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Largest coarse/fine disagreement accepted for a sub-step.
    pub error_threshold: f64,
    /// Hard floor on sub-step size (seconds).
    pub min_dt: f64,
    /// Battery current above which the internal resistance is raised.
    pub battery_current_limit: Option<f64>,
    /// Whether real light bulbs get their voltage-dependent resistance.
    pub light_bulb_correction: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            error_threshold: ERROR_THRESHOLD,
            min_dt: MIN_DT,
            battery_current_limit: None,
            light_bulb_correction: true,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sub-step error threshold.
    ///
    /// Lower thresholds subdivide more aggressively.
    pub fn with_error_threshold(mut self, error_threshold: f64) -> Self {
        self.error_threshold = error_threshold;
        self
    }

    /// Set the smallest permitted sub-step.
    pub fn with_min_dt(mut self, min_dt: f64) -> Self {
        self.min_dt = min_dt;
        self
    }

    /// Limit battery current by raising internal resistance on re-solve.
    pub fn with_battery_current_limit(mut self, limit: f64) -> Self {
        self.battery_current_limit = Some(limit);
        self
    }

    /// Enable or disable the real light-bulb re-solve.
    pub fn with_light_bulb_correction(mut self, enabled: bool) -> Self {
        self.light_bulb_correction = enabled;
        self
    }

    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<()> {
        if !(self.error_threshold >= 0.0) {
            return Err(CircuitError::invalid_parameter(format!(
                "error threshold must be non-negative (got {})",
                self.error_threshold
            )));
        }
        if !(self.min_dt > 0.0 && self.min_dt.is_finite()) {
            return Err(CircuitError::invalid_parameter(format!(
                "minimum sub-step must be positive (got {})",
                self.min_dt
            )));
        }
        if let Some(limit) = self.battery_current_limit {
            if !(limit > 0.0) {
                return Err(CircuitError::invalid_parameter(format!(
                    "battery current limit must be positive (got {})",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// The adaptive integrator this configuration describes.
    pub fn integrator(&self) -> TimestepSubdivisions {
        TimestepSubdivisions::new(self.error_threshold, self.min_dt)
    }
}

/// Outcome of one frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Sub-steps and readouts of the accepted solve
    pub result: CircuitResult,
    /// Mapping from caller elements to solver elements
    pub adapters: Vec<ElementAdapter>,
    /// Voltage of every node in the snapshot
    pub node_voltages: BTreeMap<NodeId, f64>,
    /// Whether a resistance correction triggered the single re-solve
    pub resolved: bool,
}

/// The frame solver.
///
/// Each call to [`CircuitSolver::step`] classifies the snapshot, solves the
/// loop elements over the frame with adaptive sub-stepping, and writes the
/// readouts back onto the snapshot.
#[derive(Debug, Clone, Default)]
pub struct CircuitSolver {
    config: SolverConfig,
    node_voltages: BTreeMap<NodeId, f64>,
}

impl CircuitSolver {
    /// Create a new solver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new solver with custom configuration.
    pub fn with_config(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            node_voltages: BTreeMap::new(),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Advance the snapshot by one frame of length `dt`.
    ///
    /// On success every element's current, every dynamic element's state and
    /// the solver's node-voltage table reflect the end of the frame.
    pub fn step(&mut self, elements: &mut [Element], dt: f64) -> Result<FrameResult> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(CircuitError::InvalidTimestep { dt });
        }
        circuit::validate_elements(elements)?;

        let in_loop = circuit::loop_elements(elements);
        let (network, adapters) = adapter::classify(elements, &in_loop);
        let integrator = self.config.integrator();

        let first = solve_with_adaptive_subdivision(network.clone(), dt, &integrator);
        let (result, resolved) = match self.corrected(&network, &adapters, elements, &first) {
            Some(corrected) => {
                log::debug!("re-solving frame with corrected resistances");
                (solve_with_adaptive_subdivision(corrected, dt, &integrator), true)
            }
            None => (first, false),
        };

        for adapter in &adapters {
            adapter.apply_solution(&result, &mut elements[adapter.index]);
        }
        for (element, _) in elements.iter_mut().zip(&in_loop).filter(|(_, l)| !**l) {
            adapter::clear_out_of_loop(element);
        }

        let solved: BTreeMap<NodeId, f64> = adapters
            .iter()
            .flat_map(|a| {
                let (na, nb) = result.final_circuit().nodes(a.element);
                [na, nb]
            })
            .map(|node| (node, result.node_voltage(node)))
            .collect();
        self.node_voltages = circuit::propagate_voltages(elements, &in_loop, &solved);

        Ok(FrameResult {
            result,
            adapters,
            node_voltages: self.node_voltages.clone(),
            resolved,
        })
    }

    /// Voltage at a node after the last frame.
    pub fn node_voltage(&self, node: NodeId) -> Option<f64> {
        self.node_voltages.get(&node).copied()
    }

    /// All node voltages after the last frame.
    pub fn node_voltages(&self) -> &BTreeMap<NodeId, f64> {
        &self.node_voltages
    }

    /// Apply the single voltage-dependent resistance correction.
    ///
    /// Batteries count as over the current limit when they drew more than
    /// the limit, or when the first solve fell back to the zero solution.
    /// Returns a new circuit when any resistance changed, `None` otherwise.
    /// The first solve is never iterated to convergence.
    fn corrected(
        &self,
        network: &DynamicCircuit,
        adapters: &[ElementAdapter],
        elements: &[Element],
        first: &CircuitResult,
    ) -> Option<DynamicCircuit> {
        let mut corrected = network.clone();
        let mut changed = false;
        // A shorted ideal battery makes the first solve singular.
        let singular = first.had_fallback();

        for adapter in adapters {
            match (adapter.element, &elements[adapter.index]) {
                (ElementRef::Resistor(i), Element::Resistor(r))
                    if self.config.light_bulb_correction && r.is_real_bulb() =>
                {
                    let voltage = first.average_voltage(adapter.element);
                    corrected.resistors[i].resistance = real_bulb_resistance(voltage);
                    changed = true;
                }
                (ElementRef::Battery(i), Element::Battery(b)) => {
                    let Some(limit) = self.config.battery_current_limit else {
                        continue;
                    };
                    let current = first.time_average(adapter.element);
                    if singular || current.abs() > limit {
                        let raised = b.voltage.abs() / limit;
                        let battery = &mut corrected.batteries[i];
                        if raised > battery.internal_resistance {
                            log::debug!(
                                "battery #{} drew {:.3} A; internal resistance -> {:.4} ohm",
                                adapter.index,
                                current,
                                raised
                            );
                            battery.internal_resistance = raised;
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }

        changed.then_some(corrected)
    }
}

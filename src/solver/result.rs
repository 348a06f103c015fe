//! Dynamic-circuit snapshots and per-frame readouts.

use crate::circuit::{ElementRef, NodeId};
use crate::components::DynamicElementState;

use super::companion::{DynamicCircuit, DynamicSolution};
use super::subdivision::{ResultSet, Steppable, TimestepSubdivisions};

/// Immutable snapshot of a dynamic circuit after one accepted sub-step.
///
/// `circuit` carries the capacitor and inductor states reached at the end of
/// the sub-step; `solution` is the companion solve that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicState {
    circuit: DynamicCircuit,
    solution: Option<DynamicSolution>,
}

impl DynamicState {
    /// Initial snapshot: element states as persisted by the caller.
    pub fn new(circuit: DynamicCircuit) -> Self {
        Self {
            circuit,
            solution: None,
        }
    }

    /// Circuit whose dynamic-element states hold at this instant.
    pub fn circuit(&self) -> &DynamicCircuit {
        &self.circuit
    }

    /// The solve that produced this snapshot, if any.
    pub fn solution(&self) -> Option<&DynamicSolution> {
        self.solution.as_ref()
    }

    /// Advance by one sub-step, returning a new snapshot.
    pub fn update(&self, dt: f64) -> DynamicState {
        let solution = self.circuit.solve_substep(dt);
        DynamicState {
            circuit: self.circuit.update_circuit(&solution),
            solution: Some(solution),
        }
    }

    /// Branch currents of every capacitor, then every inductor.
    pub fn characteristic(&self) -> Vec<f64> {
        match &self.solution {
            Some(solution) => solution.characteristic(),
            None => self
                .circuit
                .capacitors
                .iter()
                .map(|c| c.state.current)
                .chain(self.circuit.inductors.iter().map(|l| l.state.current))
                .collect(),
        }
    }
}

/// Drives [`DynamicState::update`] for the adaptive integrator.
///
/// The error metric is the Euclidean distance between the characteristic
/// arrays of two snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicStepper;

impl Steppable for DynamicStepper {
    type State = DynamicState;

    fn update(&self, state: &DynamicState, dt: f64) -> DynamicState {
        state.update(dt)
    }

    fn distance(&self, a: &DynamicState, b: &DynamicState) -> f64 {
        let a = a.characteristic();
        let b = b.characteristic();
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(&b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

/// All sub-steps of one frame with instantaneous and time-averaged readouts.
///
/// Instantaneous values come from the final sub-step and seed the next
/// frame. Time averages weight every sub-step by its duration and are what
/// a display should show: they do not carry one-sub-step current spikes.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitResult {
    initial: DynamicCircuit,
    steps: ResultSet<DynamicState>,
}

impl CircuitResult {
    /// Wrap the sub-steps computed from `initial`.
    pub fn new(initial: DynamicCircuit, steps: ResultSet<DynamicState>) -> Self {
        Self { initial, steps }
    }

    /// The accepted sub-steps.
    pub fn result_set(&self) -> &ResultSet<DynamicState> {
        &self.steps
    }

    /// Number of accepted sub-steps.
    pub fn substeps(&self) -> usize {
        self.steps.len()
    }

    /// Total simulated time.
    pub fn total_time(&self) -> f64 {
        self.steps.total_time()
    }

    fn final_solution(&self) -> Option<&DynamicSolution> {
        self.steps.last().and_then(|s| s.state.solution())
    }

    /// Circuit carrying the dynamic-element states at the end of the frame.
    pub fn final_circuit(&self) -> &DynamicCircuit {
        self.steps
            .last()
            .map(|s| s.state.circuit())
            .unwrap_or(&self.initial)
    }

    /// Element current at the end of the frame.
    pub fn instantaneous(&self, element: ElementRef) -> f64 {
        self.final_solution()
            .map(|s| s.current(element))
            .unwrap_or(0.0)
    }

    /// Element current averaged over the frame.
    pub fn time_average(&self, element: ElementRef) -> f64 {
        self.average(|s| s.current(element))
    }

    /// Element voltage, V(b) - V(a), at the end of the frame.
    pub fn instantaneous_voltage(&self, element: ElementRef) -> f64 {
        self.final_solution()
            .map(|s| s.voltage(element))
            .unwrap_or(0.0)
    }

    /// Element voltage averaged over the frame.
    pub fn average_voltage(&self, element: ElementRef) -> f64 {
        self.average(|s| s.voltage(element))
    }

    /// Node voltage at the end of the frame.
    pub fn node_voltage(&self, node: NodeId) -> f64 {
        self.final_solution()
            .map(|s| s.node_voltage(node))
            .unwrap_or(0.0)
    }

    /// Node voltage averaged over the frame.
    pub fn average_node_voltage(&self, node: NodeId) -> f64 {
        self.average(|s| s.node_voltage(node))
    }

    /// State a capacitor or inductor carries into the next frame.
    ///
    /// `None` for batteries and resistors.
    pub fn dynamic_state(&self, element: ElementRef) -> Option<DynamicElementState> {
        let circuit = self.final_circuit();
        match element {
            ElementRef::Capacitor(i) => Some(circuit.capacitors[i].state),
            ElementRef::Inductor(i) => Some(circuit.inductors[i].state),
            ElementRef::Battery(_) | ElementRef::Resistor(_) => None,
        }
    }

    /// Whether any sub-step fell back to the zero solution.
    pub fn had_fallback(&self) -> bool {
        self.steps
            .iter()
            .filter_map(|s| s.state.solution())
            .any(|s| s.mna().is_fallback())
    }

    fn average(&self, value: impl Fn(&DynamicSolution) -> f64) -> f64 {
        self.steps
            .time_average(|state| state.solution().map(&value).unwrap_or(0.0))
    }
}

/// Solve a dynamic circuit for a single sub-step of size `dt`.
pub fn solve_one_substep(network: &DynamicCircuit, dt: f64) -> DynamicSolution {
    network.solve_substep(dt)
}

/// Solve a dynamic circuit over `dt` with adaptive sub-stepping.
pub fn solve_with_adaptive_subdivision(
    network: DynamicCircuit,
    dt: f64,
    integrator: &TimestepSubdivisions,
) -> CircuitResult {
    let steps = integrator.subdivide(&DynamicStepper, DynamicState::new(network.clone()), dt);
    log::debug!("frame of {:e}s solved in {} sub-steps", dt, steps.len());
    CircuitResult::new(network, steps)
}

//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for one simulation frame.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and the currents of batteries and 0 Ω wires
//! - A is the coefficient matrix
//! - z is the source vector
//!
//! Each connected component pins one reference node to 0 V. Every other
//! node contributes a KCL row, every battery a `V(b) - V(a) = E` row and
//! every zero-resistance resistor a `V(a) = V(b)` row, so the system is
//! square by construction.
//!
//! ## Dynamic elements
//!
//! Capacitors and inductors are replaced by trapezoidal-rule companion
//! models ([`companion`]) for one sub-step at a time. The frame is covered by
//! an adaptive step-doubling integrator ([`subdivision`]) that halves
//! sub-steps until the coarse and fine estimates of every dynamic-element
//! current agree.

mod companion;
mod mna;
mod result;
mod simulator;
mod subdivision;

pub use companion::{
    CompanionNetwork, DynamicCapacitor, DynamicCircuit, DynamicInductor, DynamicResistor,
    DynamicSolution, ResistiveBattery,
};
pub use mna::{ElementRole, MnaCircuit, MnaElement, MnaMatrix, MnaSolution};
pub use result::{
    solve_one_substep, solve_with_adaptive_subdivision, CircuitResult, DynamicState,
    DynamicStepper,
};
pub use simulator::{CircuitSolver, FrameResult, SolverConfig};
pub use subdivision::{ResultSet, Steppable, SubStep, TimestepSubdivisions};

/// Largest coarse/fine disagreement accepted for a sub-step.
pub const ERROR_THRESHOLD: f64 = 1e-5;

/// Smallest sub-step; anything at or below it is accepted unconditionally.
pub const MIN_DT: f64 = 1e-5;

/// Fixed series resistance added to every capacitor companion (ohms).
pub const CAPACITOR_LEAKAGE_RESISTANCE: f64 = 1e-6;

/// Pivot magnitude below which the system is treated as singular.
pub const SINGULAR_PIVOT: f64 = 1e-15;
